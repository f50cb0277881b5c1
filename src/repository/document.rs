// ==========================================
// 拉丝/桁架生产线 - 文档编解码辅助
// ==========================================

use crate::repository::error::RepositoryResult;
use crate::repository::record_store::{Collection, RecordStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// 读取集合并反序列化
pub(crate) async fn load_all<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
) -> RepositoryResult<Vec<T>> {
    store
        .fetch_all(collection)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(Into::into))
        .collect()
}

pub(crate) fn to_document<T: Serialize>(value: &T) -> RepositoryResult<JsonValue> {
    Ok(serde_json::to_value(value)?)
}
