//! Publication and voting windows.
//!
//! All checks are pure functions of a question's dates and the current time;
//! every boundary is inclusive.

use chrono::{DateTime, Duration, Utc};

/// Anything with a publication date and a voting end date.
pub trait PublishWindow {
    fn pub_date(&self) -> DateTime<Utc>;

    fn end_date(&self) -> DateTime<Utc>;

    /// Has the question been published by `now`?
    fn is_published(&self, now: DateTime<Utc>) -> bool {
        now >= self.pub_date()
    }

    /// Was the question published within the day before `now`?
    fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date() && self.pub_date() <= now
    }

    /// Is `now` inside the voting window?
    fn can_vote(&self, now: DateTime<Utc>) -> bool {
        self.pub_date() <= now && now <= self.end_date()
    }

    /// Does voting close no earlier than it opens?
    fn has_valid_window(&self) -> bool {
        self.end_date() >= self.pub_date()
    }
}
