//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了进程级的开关客户端管理器。
//!
//! 应用启动时调用一次 [`FlagManager::init`]，之后通过 [`get_client`]
//! 或 crate 根部的便捷函数访问同一个客户端。

use crate::client::FlagClient;
use crate::config::Config;
use crate::error::{FlagError, Result};
use lazy_static::lazy_static;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument, warn};

lazy_static! {
    static ref CLIENT: RwLock<Option<Arc<FlagClient>>> = RwLock::new(None);
}

/// 开关客户端管理器
pub struct FlagManager;

impl FlagManager {
    /// 初始化全局客户端
    ///
    /// # 参数
    ///
    /// * `config` - 系统配置
    ///
    /// # 返回值
    ///
    /// 返回已安装的客户端。重复初始化会替换旧客户端，旧客户端的缓存资源会被关闭。
    #[instrument(skip(config), level = "info")]
    pub async fn init(config: Config) -> Result<Arc<FlagClient>> {
        let client = Arc::new(FlagClient::connect(&config).await?);
        if let Some(previous) = Self::install(client.clone()) {
            info!("Replacing previously initialized flag client");
            if let Err(e) = previous.close().await {
                warn!("Failed to close previous flag client: {}", e);
            }
        }
        Ok(client)
    }

    /// 安装一个已构建的客户端，返回被替换的旧客户端
    pub fn install(client: Arc<FlagClient>) -> Option<Arc<FlagClient>> {
        let mut slot = CLIENT.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.replace(client)
    }

    /// 移除全局客户端但不关闭
    pub fn reset() -> Option<Arc<FlagClient>> {
        let mut slot = CLIENT.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.take()
    }

    /// 是否已初始化
    pub fn is_initialized() -> bool {
        CLIENT
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }
}

/// 获取全局客户端
///
/// 未初始化时返回 [`FlagError::NotInitialized`]
pub fn get_client() -> Result<Arc<FlagClient>> {
    let slot = CLIENT.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    slot.clone().ok_or(FlagError::NotInitialized)
}

/// 关闭并移除全局客户端
#[instrument(level = "info")]
pub async fn shutdown() -> Result<()> {
    match FlagManager::reset() {
        Some(client) => {
            client.close().await?;
            info!("Flag client shut down");
            Ok(())
        }
        None => Ok(()),
    }
}
