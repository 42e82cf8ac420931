//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存键格式。其他实现需要与同一套失效方案互通，因此格式固定：
//!
//! ```text
//! flags
//! tenant:{tenant_id}
//! user:{tenant_id}:{user_id}
//! ```

/// 缓存键生成器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: Option<String>,
}

impl CacheKeys {
    /// 创建键生成器，`prefix` 为 Some 时所有键以 `{prefix}:` 开头
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    fn render(&self, key: String) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key,
        }
    }

    /// 平台开关集合
    pub fn flags(&self) -> String {
        self.render("flags".to_string())
    }

    /// 租户覆盖集合
    pub fn tenant(&self, tenant_id: &str) -> String {
        self.render(format!("tenant:{}", tenant_id))
    }

    /// 用户覆盖集合
    pub fn user(&self, tenant_id: &str, user_id: &str) -> String {
        self.render(format!("user:{}:{}", tenant_id, user_id))
    }
}
