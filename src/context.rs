//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 请求级开关上下文。
//!
//! 每个逻辑请求在 [`scope`] 中运行，拥有一个独立的 task-local 槽位。
//! `load_context` 异步解析一次所有已知开关并替换槽位中的快照，之后
//! 同一请求内的读取都是同步、无副作用的。快照从不在并发请求之间共享。
//!
//! 加载开始时槽位被标记为"加载中"，只有完整解析成功后才替换快照并清除
//! 标记。加载失败或被取消时标记保留，同步读取会返回
//! [`FlagError::ContextLoadIncomplete`]，绝不会读到部分快照。

use crate::error::{FlagError, Result};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// 已解析的请求级快照
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedContext {
    tenant_id: Option<String>,
    user_id: Option<String>,
    flags: HashMap<String, bool>,
}

impl ResolvedContext {
    /// 创建快照
    pub fn new(
        tenant_id: Option<String>,
        user_id: Option<String>,
        flags: HashMap<String, bool>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            flags,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn flags(&self) -> &HashMap<String, bool> {
        &self.flags
    }

    /// 快照是否针对给定身份计算
    pub fn matches(&self, tenant_id: Option<&str>, user_id: Option<&str>) -> bool {
        self.tenant_id() == tenant_id && self.user_id() == user_id
    }

    /// 读取单个开关，未知名称记录 warn 并返回 false
    pub fn lookup(&self, name: &str) -> bool {
        match self.flags.get(name) {
            Some(enabled) => *enabled,
            None => {
                warn!(flag = name, "Unknown feature flag '{}', returning false", name);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ContextSlot {
    snapshot: Option<Arc<ResolvedContext>>,
    pending: bool,
    layers: Vec<OverrideLayer>,
    next_layer: u64,
}

/// 一层临时覆盖，记录应用前的槽位状态
#[derive(Debug, Clone)]
struct OverrideLayer {
    id: u64,
    base: Option<Arc<ResolvedContext>>,
    base_pending: bool,
    flags: HashMap<String, bool>,
}

fn apply_overrides(
    base: Option<&ResolvedContext>,
    flags: &HashMap<String, bool>,
) -> Arc<ResolvedContext> {
    let base = base.cloned().unwrap_or_default();
    let mut merged = base.flags;
    merged.extend(flags.iter().map(|(k, v)| (k.clone(), *v)));
    Arc::new(ResolvedContext::new(base.tenant_id, base.user_id, merged))
}

impl ContextSlot {
    fn push_layer(&mut self, flags: HashMap<String, bool>) -> u64 {
        let id = self.next_layer;
        self.next_layer += 1;
        let base = self.snapshot.take();
        self.snapshot = Some(apply_overrides(base.as_deref(), &flags));
        self.layers.push(OverrideLayer {
            id,
            base,
            base_pending: self.pending,
            flags,
        });
        self.pending = false;
        id
    }

    /// 移除一层覆盖，并在其之上的各层重新叠加
    fn remove_layer(&mut self, id: u64) {
        let Some(pos) = self.layers.iter().position(|layer| layer.id == id) else {
            return;
        };
        let removed = self.layers.remove(pos);
        let mut snapshot = removed.base;
        let mut pending = removed.base_pending;
        for layer in &mut self.layers[pos..] {
            layer.base = snapshot.clone();
            layer.base_pending = pending;
            snapshot = Some(apply_overrides(snapshot.as_deref(), &layer.flags));
            pending = false;
        }
        self.snapshot = snapshot;
        self.pending = pending;
    }
}

tokio::task_local! {
    static FLAG_CONTEXT: RefCell<ContextSlot>;
}

/// 在新的请求作用域中运行 future
///
/// 中间件应在每个请求的入口调用它；作用域内的 `load_context` 与同步读取
/// 只对该 future 可见。
pub async fn scope<F: Future>(f: F) -> F::Output {
    FLAG_CONTEXT
        .scope(RefCell::new(ContextSlot::default()), f)
        .await
}

/// 在新的请求作用域中运行同步闭包
pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    FLAG_CONTEXT.sync_scope(RefCell::new(ContextSlot::default()), f)
}

/// 当前是否处于请求作用域内
pub fn in_scope() -> bool {
    FLAG_CONTEXT.try_with(|_| ()).is_ok()
}

fn with_slot<R>(f: impl FnOnce(&RefCell<ContextSlot>) -> R) -> Result<R> {
    FLAG_CONTEXT
        .try_with(f)
        .map_err(|_| FlagError::ContextNotLoaded)
}

/// 标记加载开始
pub(crate) fn begin_load() -> Result<()> {
    with_slot(|slot| slot.borrow_mut().pending = true)
}

/// 安装完整解析的快照
pub(crate) fn install(ctx: ResolvedContext) -> Result<()> {
    with_slot(|slot| {
        let mut slot = slot.borrow_mut();
        slot.snapshot = Some(Arc::new(ctx));
        slot.pending = false;
    })
}

/// 清空当前作用域的快照
///
/// 同时丢弃所有覆盖层，之后释放的守卫不再改变槽位。
pub fn clear() -> Result<()> {
    with_slot(|slot| {
        let mut slot = slot.borrow_mut();
        let next_layer = slot.next_layer;
        *slot = ContextSlot {
            next_layer,
            ..ContextSlot::default()
        };
    })
}

/// 当前快照
pub fn snapshot() -> Result<Arc<ResolvedContext>> {
    with_slot(|slot| {
        let slot = slot.borrow();
        if slot.pending {
            return Err(FlagError::ContextLoadIncomplete);
        }
        slot.snapshot.clone().ok_or(FlagError::ContextNotLoaded)
    })?
}

/// 开关是否启用
pub fn is_enabled(name: &str) -> Result<bool> {
    Ok(snapshot()?.lookup(name))
}

/// 开关是否关闭
pub fn is_disabled(name: &str) -> Result<bool> {
    Ok(!is_enabled(name)?)
}

/// 所有开关的值
pub fn get_all() -> Result<HashMap<String, bool>> {
    Ok(snapshot()?.flags.clone())
}

/// 所有启用的开关名称
pub fn get_enabled() -> Result<BTreeSet<String>> {
    Ok(snapshot()?
        .flags
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(name, _)| name.clone())
        .collect())
}

/// 任一开关启用即返回 true；未知名称被跳过
pub fn is_any_enabled(names: &[&str]) -> Result<bool> {
    let ctx = snapshot()?;
    Ok(names.iter().any(|name| ctx.lookup(name)))
}

/// 所有开关都启用才返回 true；未知名称视为 false
pub fn is_all_enabled(names: &[&str]) -> Result<bool> {
    let ctx = snapshot()?;
    Ok(names.iter().all(|name| ctx.lookup(name)))
}

/// 路由守卫：开关未启用时返回 [`FlagError::FlagDisabled`]
pub fn require_enabled(name: &str) -> Result<()> {
    if is_enabled(name)? {
        Ok(())
    } else {
        Err(FlagError::FlagDisabled(name.to_string()))
    }
}

/// 快照对应的 (tenant_id, user_id)
pub fn current_scope() -> Result<(Option<String>, Option<String>)> {
    let ctx = snapshot()?;
    Ok((ctx.tenant_id.clone(), ctx.user_id.clone()))
}

/// 临时覆盖守卫
///
/// drop 时只撤销本守卫添加的那一层覆盖，无论作用域是正常结束、
/// 提前 `?` 返回还是 panic 展开。嵌套守卫可以按任意顺序释放：
/// 所有覆盖层都释放后，槽位回到第一层覆盖之前的状态（包括"未加载"状态）。
/// 守卫不能跨任务移动。
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct OverrideGuard {
    layer: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        let layer = self.layer;
        let _ = FLAG_CONTEXT.try_with(|slot| slot.borrow_mut().remove_layer(layer));
    }
}

/// 临时覆盖开关值（测试用）
///
/// 覆盖值合并到当前快照之上；没有快照时以空快照为基础。
pub fn override_flags<I, K>(flags: I) -> Result<OverrideGuard>
where
    I: IntoIterator<Item = (K, bool)>,
    K: Into<String>,
{
    let flags: HashMap<String, bool> = flags.into_iter().map(|(k, v)| (k.into(), v)).collect();
    with_slot(|slot| OverrideGuard {
        layer: slot.borrow_mut().push_layer(flags),
        _not_send: PhantomData,
    })
}

/// 在覆盖生效期间运行闭包
pub fn with_overrides<I, K, R>(flags: I, f: impl FnOnce() -> R) -> Result<R>
where
    I: IntoIterator<Item = (K, bool)>,
    K: Into<String>,
{
    let _guard = override_flags(flags)?;
    Ok(f())
}
