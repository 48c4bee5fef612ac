// ==========================================
// 选课席位分配系统 - 行字段编解码
// ==========================================
// 职责: 枚举文本列 / 时间戳列 与领域类型之间的转换
// 约定: 时间戳统一存 RFC3339 文本
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use std::str::FromStr;

/// 解析枚举文本列（FromStr 失败时转为 rusqlite 转换错误）
pub(crate) fn parse_text<T>(column: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse::<T>()
        .map_err(|msg| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, msg.into()))
}

/// 可空枚举文本列
pub(crate) fn parse_optional_text<T>(column: usize, value: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    value.map(|v| parse_text(column, &v)).transpose()
}

/// 解析 RFC3339 时间戳列
pub(crate) fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// 可空时间戳列
pub(crate) fn parse_optional_timestamp(
    column: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, &v)).transpose()
}

/// JSON 文本列
pub(crate) fn parse_json<T>(column: usize, value: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub(crate) fn timestamp_text(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}
