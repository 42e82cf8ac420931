//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 空操作缓存后端。

use super::CacheBackend;
use crate::error::Result;
use async_trait::async_trait;

/// 空操作缓存
///
/// 永远未命中，用于在不引入分支逻辑的情况下关闭缓存
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<u64>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
