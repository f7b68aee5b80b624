/// Human-readable notifications for whoever is watching.
///
/// The core reports through the `Notifier` trait and never formats for a
/// particular display. `Feed` is the in-process implementation: a bounded
/// list of posts that also forwards every message to `tracing`.
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Status,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Status => "status",
            Level::Warn => "warn",
            Level::Error => "error",
        })
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: String);

    fn status(&self, message: String) {
        self.notify(Level::Status, message);
    }

    fn warn(&self, message: String) {
        self.notify(Level::Warn, message);
    }

    fn error(&self, message: String) {
        self.notify(Level::Error, message);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub level: Level,
    pub message: String,
    pub at: SystemTime,
    /// Consecutive repeats folded into this post.
    pub count: usize,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count > 1 {
            write!(f, "{} (x{})", self.message, self.count)
        } else {
            f.write_str(&self.message)
        }
    }
}

pub struct Feed {
    posts: Mutex<VecDeque<Post>>,
    capacity: usize,
}

impl Feed {
    pub fn new(capacity: usize) -> Self {
        Self {
            posts: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
        }
    }

    /// Posts, oldest first.
    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<Post> {
        self.posts.lock().back().cloned()
    }

    /// Up to `n` most recent messages, newest first.
    pub fn last_n(&self, n: usize) -> Vec<String> {
        self.posts
            .lock()
            .iter()
            .rev()
            .take(n)
            .map(|p| p.to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.posts.lock().clear();
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new(512)
    }
}

impl Notifier for Feed {
    fn notify(&self, level: Level, message: String) {
        match level {
            Level::Status => tracing::info!(target: "arena_hud::feed", "{}", message),
            Level::Warn => tracing::warn!(target: "arena_hud::feed", "{}", message),
            Level::Error => tracing::error!(target: "arena_hud::feed", "{}", message),
        }

        let mut posts = self.posts.lock();
        if let Some(last) = posts.back_mut() {
            if last.level == level && last.message == message {
                last.count += 1;
                last.at = SystemTime::now();
                return;
            }
        }
        if posts.len() >= self.capacity {
            posts.pop_front();
        }
        posts.push_back(Post {
            level,
            message,
            at: SystemTime::now(),
            count: 1,
        });
    }
}
