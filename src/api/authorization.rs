// ==========================================
// 拉丝/桁架生产线 - 主管授权
// ==========================================
// 用途: 包称重超差时的二次确认
// 口令来源: config_kv.manager_credential; 未配置时一律拒绝
// ==========================================

pub trait ManagerAuthorizer: Send + Sync {
    fn verify(&self, credential: &str) -> bool;
}

/// 固定口令授权
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialAuthorizer {
    credential: Option<String>,
}

impl StaticCredentialAuthorizer {
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential: credential
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }
}

impl ManagerAuthorizer for StaticCredentialAuthorizer {
    fn verify(&self, credential: &str) -> bool {
        match &self.credential {
            Some(expected) => expected == credential.trim(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let auth = StaticCredentialAuthorizer::new(Some(" 4321 ".to_string()));
        assert!(auth.verify("4321"));
        assert!(!auth.verify("1234"));

        let unset = StaticCredentialAuthorizer::new(Some("  ".to_string()));
        assert!(!unset.verify(""));
    }
}
