use crate::block::{ALIGNMENT, HEADER_SIZE};

/// Smallest leftover that is worth carving into its own block.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 1024;

/// Tunables of a [`HeapManager`](crate::HeapManager).
///
/// ```rust
/// use firstfit::Config;
///
/// const CONFIG: Config = Config::DEFAULT.with_split_threshold(4096).with_slack_gate(false);
/// assert_eq!(CONFIG.split_threshold, 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// A free block is split only when the leftover is at least this large
  /// (and the block is at least twice the request).
  pub split_threshold: usize,
  /// Skip the first-fit scan when the free bytes in total cannot cover the
  /// request.
  pub slack_gate: bool,
  /// Walk the whole list to confirm a pointer belongs to the heap before
  /// releasing or resizing it.
  pub verify_ownership: bool,
  /// Emit `log` records for growth, splits, merges and swallowed errors.
  pub log_events: bool,
}

impl Config {
  pub const DEFAULT: Config = Config {
    split_threshold: DEFAULT_SPLIT_THRESHOLD,
    slack_gate: true,
    verify_ownership: false,
    log_events: true,
  };

  /// Defaults without logging, for managers that may sit under a logger.
  pub const fn quiet() -> Self {
    Self::DEFAULT.with_log_events(false)
  }

  pub const fn with_split_threshold(
    mut self,
    split_threshold: usize,
  ) -> Self {
    self.split_threshold = split_threshold;
    self
  }

  pub const fn with_slack_gate(
    mut self,
    slack_gate: bool,
  ) -> Self {
    self.slack_gate = slack_gate;
    self
  }

  pub const fn with_verify_ownership(
    mut self,
    verify_ownership: bool,
  ) -> Self {
    self.verify_ownership = verify_ownership;
    self
  }

  pub const fn with_log_events(
    mut self,
    log_events: bool,
  ) -> Self {
    self.log_events = log_events;
    self
  }

  /// Split threshold actually applied: a tail needs room for its header and
  /// at least one aligned word of payload.
  pub(crate) const fn effective_split_threshold(&self) -> usize {
    let floor = HEADER_SIZE + ALIGNMENT;
    if self.split_threshold < floor { floor } else { self.split_threshold }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::DEFAULT
  }
}
