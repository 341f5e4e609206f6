use super::palette::ClassId;

/// Result of feeding one classified sample to the [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The sample fell in no range; the confirmed class is kept.
    NoMatch,
    /// The sample agrees with the confirmed class.
    Unchanged,
    /// A different class was seen `count` times in a row so far.
    Pending { class: ClassId, count: u8 },
    /// A different class was seen often enough to take over.
    Confirmed(ClassId),
}

/// Debounced class tracking.
///
/// A new class is only confirmed after `required` consecutive samples
/// agree on it. Samples matching no range never clear the confirmed class.
#[derive(Debug, Clone)]
pub struct Debouncer {
    required: u8,
    current: Option<ClassId>,
    candidate: Option<ClassId>,
    count: u8,
}

impl Debouncer {
    pub fn new(required: u8) -> Self {
        Self {
            required: required.max(1),
            current: None,
            candidate: None,
            count: 0,
        }
    }

    pub fn current(&self) -> Option<ClassId> {
        self.current
    }

    pub fn observe(&mut self, class: Option<ClassId>) -> Observation {
        let Some(class) = class else {
            self.reset();
            return Observation::NoMatch;
        };

        if self.current == Some(class) {
            self.reset();
            return Observation::Unchanged;
        }

        if self.candidate == Some(class) {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = Some(class);
            self.count = 1;
        }

        if self.count >= self.required {
            self.current = Some(class);
            self.reset();
            Observation::Confirmed(class)
        } else {
            Observation::Pending {
                class,
                count: self.count,
            }
        }
    }

    fn reset(&mut self) {
        self.candidate = None;
        self.count = 0;
    }
}
