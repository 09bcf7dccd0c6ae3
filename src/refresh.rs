use crate::error::FetchSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStateTracker {
    info_loading: bool,
    chapters_loading: bool,
}

impl RefreshStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_loading(&self) -> bool {
        self.info_loading
    }

    pub fn chapters_loading(&self) -> bool {
        self.chapters_loading
    }

    pub fn busy(&self) -> bool {
        self.info_loading || self.chapters_loading
    }

    pub fn start(&mut self, source: FetchSource) -> bool {
        self.set(source, true)
    }

    pub fn finish(&mut self, source: FetchSource) -> bool {
        self.set(source, false)
    }

    fn set(&mut self, source: FetchSource, value: bool) -> bool {
        match source {
            FetchSource::Metadata => self.info_loading = value,
            FetchSource::Chapters => self.chapters_loading = value,
        }
        self.busy()
    }
}
