use std::time::Duration;

/// Notification category a change is batched under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Settings,
    Status,
    Update,
}

/// Pending event count and the time of the batch's first event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    pending: u32,
    first_at: Option<Duration>,
}

impl Bucket {
    pub fn record(&mut self, now: Duration) {
        if self.pending == 0 {
            self.first_at = Some(now);
        }
        self.pending = self.pending.saturating_add(1);
    }

    #[cfg(test)]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// A lone event settles after `single`, a burst after `multi`.
    pub fn is_due(&self, now: Duration, single: Duration, multi: Duration) -> bool {
        let Some(first) = self.first_at else {
            return false;
        };
        let waited = now.saturating_sub(first);
        match self.pending {
            0 => false,
            1 => waited >= single,
            _ => waited >= multi,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Coalescer {
    settings: Bucket,
    status: Bucket,
    update: Bucket,
}

impl Coalescer {
    pub fn record(&mut self, category: Category, now: Duration) {
        self.bucket_mut(category).record(now);
    }

    #[cfg(test)]
    pub fn bucket(&self, category: Category) -> &Bucket {
        match category {
            Category::Settings => &self.settings,
            Category::Status => &self.status,
            Category::Update => &self.update,
        }
    }

    fn bucket_mut(&mut self, category: Category) -> &mut Bucket {
        match category {
            Category::Settings => &mut self.settings,
            Category::Status => &mut self.status,
            Category::Update => &mut self.update,
        }
    }

    /// Categories whose batch has settled; their buckets are reset.
    pub fn take_due(
        &mut self,
        now: Duration,
        single: Duration,
        multi: Duration,
    ) -> heapless::Vec<Category, 3> {
        let mut due = heapless::Vec::new();
        for category in [Category::Settings, Category::Status, Category::Update] {
            let bucket = self.bucket_mut(category);
            if bucket.is_due(now, single, multi) {
                bucket.clear();
                let _ = due.push(category);
            }
        }
        due
    }
}
