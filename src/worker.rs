//! 在 tokio 阻塞线程池上执行的受限渲染。
//!
//! 同时最多运行 `max_concurrent` 个渲染；同一 (模板, 房源) 正在渲染时，
//! 第二个请求会被拒绝；超时的渲染在下一个页面或切片边界处取消。

use crate::engine::{Engine, RenderRequest};
use crate::error::RenderError;
use crate::pdf::PdfArtifact;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, warn};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), RenderError> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// 把请求同步转换为 PDF (或单页预览) 的渲染器
pub trait Render: Send + Sync + 'static {
    fn render(&self, request: &RenderRequest, cancel: &CancelToken) -> Result<PdfArtifact, RenderError>;

    fn preview(
        &self,
        request: &RenderRequest,
        page: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, RenderError>;
}

impl Render for Engine {
    fn render(&self, request: &RenderRequest, cancel: &CancelToken) -> Result<PdfArtifact, RenderError> {
        Engine::render(self, request, cancel)
    }

    fn preview(
        &self,
        request: &RenderRequest,
        page: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, RenderError> {
        self.preview_png(request, page, cancel)
    }
}

type PairKey = (String, String);

/// 没有 id 的房源按名称区分
fn pair_key(request: &RenderRequest) -> PairKey {
    let property = &request.property;
    let who = if property.id.trim().is_empty() {
        format!("name:{}", property.name.trim())
    } else {
        property.id.clone()
    };
    (request.template.id.clone(), who)
}

/// 占用一个 (模板, 房源) 槽位，drop 时释放
struct InFlight {
    set: Arc<Mutex<HashSet<PairKey>>>,
    key: PairKey,
}

fn lock(set: &Mutex<HashSet<PairKey>>) -> MutexGuard<'_, HashSet<PairKey>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InFlight {
    fn acquire(set: &Arc<Mutex<HashSet<PairKey>>>, key: PairKey) -> Result<Self, RenderError> {
        if !lock(set).insert(key.clone()) {
            return Err(RenderError::AlreadyInFlight {
                template: key.0,
                property: key.1,
            });
        }
        Ok(Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.key);
    }
}

pub struct RenderWorker<R: Render = Engine> {
    renderer: Arc<R>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<PairKey>>>,
    timeout: Duration,
}

impl<R: Render> RenderWorker<R> {
    pub fn new(renderer: Arc<R>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            renderer,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            timeout,
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub async fn render(&self, request: RenderRequest) -> Result<PdfArtifact, RenderError> {
        self.run(request, |renderer, request, cancel| renderer.render(request, cancel))
            .await
    }

    /// 单页 PNG，与完整渲染共用同样的限制
    pub async fn preview(&self, request: RenderRequest, page: usize) -> Result<Vec<u8>, RenderError> {
        self.run(request, move |renderer, request, cancel| {
            renderer.preview(request, page, cancel)
        })
        .await
    }

    async fn run<T, F>(&self, request: RenderRequest, job: F) -> Result<T, RenderError>
    where
        T: Send + 'static,
        F: FnOnce(&R, &RenderRequest, &CancelToken) -> Result<T, RenderError> + Send + 'static,
    {
        let slot = InFlight::acquire(&self.in_flight, pair_key(&request))?;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| RenderError::Worker(e.to_string()))?;

        let cancel = CancelToken::new();
        let token = cancel.clone();
        let renderer = Arc::clone(&self.renderer);
        // slot 与 permit 随任务结束释放，超时后仍占用直到任务真正退出
        let task = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            let _permit = permit;
            job(&*renderer, &request, &token)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => {
                error!(error = %join, "render task panicked");
                Err(RenderError::Worker(join.to_string()))
            }
            Err(_) => {
                cancel.cancel();
                warn!(timeout_secs = self.timeout.as_secs(), "render timed out, cancelling");
                Err(RenderError::TimedOut(self.timeout.as_secs()))
            }
        }
    }
}
