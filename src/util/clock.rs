use std::sync::{
  Arc,
  atomic::{AtomicI64, Ordering},
};

/// Source of the current time in seconds since epoch. A fixed clock is shared
/// between clones, so moving it moves every holder.
#[derive(Clone, Debug, Default)]
pub struct Clock {
  fixed: Option<Arc<AtomicI64>>,
}

impl Clock {
  pub fn system() -> Self {
    Self { fixed: None }
  }

  pub fn fixed(now: i64) -> Self {
    Self { fixed: Some(Arc::new(AtomicI64::new(now))) }
  }

  pub fn now(&self) -> i64 {
    match &self.fixed {
      Some(now) => now.load(Ordering::SeqCst),
      None => chrono::Utc::now().timestamp(),
    }
  }

  /// Moves a fixed clock. Has no effect on the system clock.
  pub fn set(&self, now: i64) {
    if let Some(fixed) = &self.fixed {
      fixed.store(now, Ordering::SeqCst);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fixed_clock_is_shared() {
    let clock = Clock::fixed(100);
    let other = clock.clone();
    other.set(250);
    assert_eq!(clock.now(), 250);
  }

  #[test]
  fn test_system_clock_ignores_set() {
    let clock = Clock::system();
    clock.set(0);
    assert!(clock.now() > 1_700_000_000);
  }
}
