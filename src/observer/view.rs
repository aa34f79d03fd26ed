use crate::{models::EvaluationRecord, render::render_overlay};

/// What an observer currently shows. Pushes and polls both feed [`apply`],
/// so whichever arrives first wins and the other becomes a no-op.
///
/// [`apply`]: ObservedView::apply
#[derive(Debug, Default, Clone)]
pub struct ObservedView {
    displayed: Option<EvaluationRecord>,
    notice: Option<String>,
}

impl ObservedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> Option<&EvaluationRecord> {
        self.displayed.as_ref()
    }

    /// Takes `record` unconditionally; used for the reply to our own `NEW_UNIT`.
    pub fn reset(&mut self, record: EvaluationRecord) -> bool {
        let changed = self.displayed.as_ref() != Some(&record);
        self.displayed = Some(record);
        changed
    }

    /// Takes `record` only if it supersedes what is displayed.
    pub fn apply(&mut self, record: EvaluationRecord) -> bool {
        let newer = match &self.displayed {
            None => true,
            Some(current) => record.supersedes(current),
        };
        if newer {
            self.displayed = Some(record);
        }
        newer
    }

    pub fn set_notice(&mut self, notice: Option<String>) -> bool {
        let changed = self.notice != notice;
        self.notice = notice;
        changed
    }

    /// The displayed record reached `done` or `error`.
    pub fn is_settled(&self) -> bool {
        self.displayed
            .as_ref()
            .map(|record| record.status.is_terminal())
            .unwrap_or(false)
    }

    pub fn render(&self) -> Option<String> {
        self.displayed
            .as_ref()
            .map(|record| render_overlay(record, self.notice.as_deref()))
    }
}
