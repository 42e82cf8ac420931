//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了特性开关系统的指标收集功能。

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{span, Level};

/// 指标收集器
///
/// 每个客户端持有一份，克隆后共享同一组计数
#[derive(Clone, Debug, Default)]
pub struct FlagMetrics {
    /// 请求总数统计
    /// key: "component:op:result"
    requests_total: Arc<DashMap<String, u64>>,
}

impl FlagMetrics {
    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `component` - 组件（cache/store/resolver）
    /// * `op` - 操作类型
    /// * `result` - 操作结果（hit/miss/error/unknown ...）
    pub fn record(&self, component: &str, op: &str, result: &str) {
        let span = span!(Level::TRACE, "flag_metric", component, op, result);
        let _enter = span.enter();
        let key = format!("{}:{}:{}", component, op, result);
        *self.requests_total.entry(key).or_insert(0) += 1;
    }

    /// 读取单个计数
    pub fn count(&self, component: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", component, op, result);
        self.requests_total.get(&key).map(|v| *v).unwrap_or(0)
    }

    /// 未知开关的解析次数
    pub fn unknown_flags(&self) -> u64 {
        self.count("resolver", "resolve", "unknown")
    }

    /// 缓存后端错误次数
    pub fn cache_errors(&self) -> u64 {
        self.count("cache", "get", "error")
            + self.count("cache", "set", "error")
            + self.count("cache", "delete", "error")
    }

    /// 将所有指标格式化为 Prometheus 文本
    pub fn render(&self) -> String {
        let mut entries: Vec<(String, u64)> = self
            .requests_total
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort();

        let mut output = String::new();
        for (key, count) in entries {
            let parts: Vec<&str> = key.splitn(3, ':').collect();
            if parts.len() == 3 {
                output.push_str(&format!(
                    "oxflag_requests_total{{component=\"{}\", op=\"{}\", result=\"{}\"}} {}\n",
                    parts[0], parts[1], parts[2], count
                ));
            }
        }
        output
    }
}
