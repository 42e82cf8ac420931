//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志与链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// 初始化 tracing 订阅者
///
/// 此函数应该在应用程序启动时调用一次。已存在全局订阅者时保持原状。
///
/// # 参数
///
/// * `service_name` - 服务名称，作为 tracer 名称
/// * `filter` - 过滤指令（例如 "oxflag=debug"）；为 None 时读取 `RUST_LOG`，默认 "info"
///
/// # 返回值
///
/// 成功安装返回 true，已有全局订阅者时返回 false
pub fn init_tracing(service_name: &str, filter: Option<&str>) -> bool {
    let env_filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // 未配置导出器时 provider 不产生外部流量，只为 span 分配上下文
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
