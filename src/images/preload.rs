//! Background preloading around the current slide.
//!
//! [`plan`] is the pure part: which URLs matter for a position, and how much.
//! [`PreloadScheduler`] keeps the tasks for the latest plan running, cancels
//! the ones that fell out of it, and caps how many loads run at once.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::content::ProcessedSection;

use super::cache::ImageCache;
use super::loader::{DecodedImage, ImageLoader};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Slides of the next section that get warmed up near a section end.
const NEXT_SECTION_SLIDES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadRequest {
    pub url: String,
    /// Lower is more urgent; 0 is the slide on screen.
    pub priority: u32,
}

/// URLs worth having around `(section_id, slide_index)`, most urgent first.
/// Each URL appears once, at the lowest priority it qualifies for.
pub fn plan(
    sections: &[ProcessedSection],
    section_id: usize,
    slide_index: usize,
    distance: usize,
) -> Vec<PreloadRequest> {
    let Some(section) = sections.iter().find(|s| s.id == section_id) else {
        return Vec::new();
    };
    if section.slides.is_empty() {
        return Vec::new();
    }

    let current = slide_index.min(section.last_slide_index());
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    let mut push = |url: &str, priority: u32| {
        if seen.insert(url.to_string()) {
            requests.push(PreloadRequest {
                url: url.to_string(),
                priority,
            });
        }
    };

    let mut last_tier = 0;
    for (offset, slide) in section.slides.iter().skip(current).take(distance + 1).enumerate() {
        let priority = offset as u32;
        for url in slide.image_urls() {
            push(url, priority);
        }
        last_tier = priority;
    }

    let remaining = section.slide_count() - current;
    if remaining <= NEXT_SECTION_SLIDES {
        if let Some(next) = sections.iter().find(|s| s.id == section_id + 1) {
            for slide in next.slides.iter().take(NEXT_SECTION_SLIDES) {
                for url in slide.image_urls() {
                    push(url, last_tier + 1);
                }
            }
        }
    }

    requests
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadStats {
    pub loaded: usize,
    pub in_flight: usize,
    pub queued: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Queued,
    InFlight,
}

struct PreloadTask {
    /// Unique per dispatch; doubles as first-seen order in the queue.
    id: u64,
    priority: u32,
    token: CancellationToken,
    state: TaskState,
}

struct SchedulerInner {
    tasks: HashMap<String, PreloadTask>,
    loaded: HashSet<String>,
    failed: HashSet<String>,
    next_id: u64,
    root: CancellationToken,
}

pub struct PreloadScheduler<L: ImageLoader> {
    cache: ImageCache<L>,
    inner: Arc<Mutex<SchedulerInner>>,
    max_concurrent: usize,
}

impl<L: ImageLoader> Clone for PreloadScheduler<L> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            inner: Arc::clone(&self.inner),
            max_concurrent: self.max_concurrent,
        }
    }
}

impl<L: ImageLoader> PreloadScheduler<L> {
    pub fn new(cache: ImageCache<L>, max_concurrent: usize) -> Self {
        Self {
            cache,
            inner: Arc::new(Mutex::new(SchedulerInner {
                tasks: HashMap::new(),
                loaded: HashSet::new(),
                failed: HashSet::new(),
                next_id: 0,
                root: CancellationToken::new(),
            })),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn cache(&self) -> &ImageCache<L> {
        &self.cache
    }

    /// Bring background work in line with the plan for this position and
    /// return that plan. Safe to call on every slide change: tasks already
    /// running for a wanted URL are kept, loaded and failed URLs are skipped.
    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &self,
        section_id: usize,
        slide_index: usize,
        sections: &[ProcessedSection],
        distance: usize,
    ) -> Vec<PreloadRequest> {
        let requests = plan(sections, section_id, slide_index, distance);
        let wanted: HashSet<&str> = requests.iter().map(|r| r.url.as_str()).collect();

        let mut inner = self.lock();

        let stale: Vec<String> = inner
            .tasks
            .keys()
            .filter(|url| !wanted.contains(url.as_str()))
            .cloned()
            .collect();
        for url in stale {
            if let Some(task) = inner.tasks.remove(&url) {
                task.token.cancel();
                log_info!("Cancelled stale preload: {}", url);
            }
        }

        let mut dispatched = 0;
        for request in &requests {
            if inner.failed.contains(&request.url) {
                continue;
            }
            if inner.loaded.contains(&request.url) {
                if self.cache.has(&request.url) {
                    continue;
                }
                // evicted since; fetch it again
                inner.loaded.remove(&request.url);
            }
            if let Some(task) = inner.tasks.get_mut(&request.url) {
                task.priority = request.priority;
                continue;
            }
            if self.cache.has(&request.url) {
                inner.loaded.insert(request.url.clone());
                continue;
            }

            let id = inner.next_id;
            inner.next_id += 1;
            let token = inner.root.child_token();
            inner.tasks.insert(
                request.url.clone(),
                PreloadTask {
                    id,
                    priority: request.priority,
                    token,
                    state: TaskState::Queued,
                },
            );
            dispatched += 1;
        }

        if dispatched > 0 {
            log_info!(
                "Queued {} preloads around section {} slide {}",
                dispatched,
                section_id,
                slide_index
            );
        }
        self.pump(&mut inner);
        requests
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.lock().loaded.contains(url)
    }

    pub fn stats(&self) -> PreloadStats {
        let inner = self.lock();
        let in_flight = inner
            .tasks
            .values()
            .filter(|t| t.state == TaskState::InFlight)
            .count();
        PreloadStats {
            loaded: inner.loaded.len(),
            in_flight,
            queued: inner.tasks.len() - in_flight,
            failed: inner.failed.len(),
        }
    }

    /// Cancel everything and forget what was loaded or failed.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.root.cancel();
        inner.root = CancellationToken::new();
        inner.tasks.clear();
        inner.loaded.clear();
        inner.failed.clear();
        log_info!("Preload scheduler cleared");
    }

    /// Start queued tasks, most urgent first, until the concurrency cap.
    fn pump(&self, inner: &mut SchedulerInner) {
        loop {
            let running = inner
                .tasks
                .values()
                .filter(|t| t.state == TaskState::InFlight)
                .count();
            if running >= self.max_concurrent {
                return;
            }

            let Some((url, task)) = inner
                .tasks
                .iter_mut()
                .filter(|(_, t)| t.state == TaskState::Queued)
                .min_by_key(|(_, t)| (t.priority, t.id))
            else {
                return;
            };

            task.state = TaskState::InFlight;
            let url = url.clone();
            let id = task.id;
            let token = task.token.clone();
            log_debug!("Preloading {} (priority {})", url, task.priority);

            let scheduler = self.clone();
            tokio::spawn(async move {
                let outcome = scheduler.cache.get_cancellable(&url, &token).await;
                scheduler.settle(&url, id, outcome);
            });
        }
    }

    fn settle(&self, url: &str, id: u64, outcome: Result<Option<Arc<DecodedImage>>>) {
        let mut inner = self.lock();
        // cancelled or superseded tasks were already dropped from tracking
        if !inner.tasks.get(url).is_some_and(|t| t.id == id) {
            return;
        }
        inner.tasks.remove(url);

        match outcome {
            Ok(Some(_)) => {
                inner.loaded.insert(url.to_string());
            }
            Ok(None) => log_debug!("Preload cancelled: {}", url),
            Err(err) => {
                log_warn!("Preload failed for {}: {:#}", url, err);
                inner.failed.insert(url.to_string());
            }
        }

        self.pump(&mut inner);
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
