use super::CallStore;
use crate::attribute::compare_calls;
use crate::call::Call;
use crate::config::SortOptions;
use crate::filter::FilterState;

impl CallStore {
    pub fn sort_options(&self) -> SortOptions {
        self.sort
    }

    /// Change the list order.
    ///
    /// Cached filter verdicts are kept; only the order changes, so the
    /// change flag is raised for renderers to redraw.
    pub fn set_sort_options(&mut self, sort: SortOptions) {
        if self.sort != sort {
            self.sort = sort;
            self.mark_changed();
        }
    }

    /// Calls passing the filters, in the current sort order.
    pub fn visible_calls(&self) -> Vec<&Call> {
        self.visible_calls_by(self.sort)
    }

    /// Calls passing the filters, ordered by `sort`.
    ///
    /// Ties keep creation order regardless of direction.
    pub fn visible_calls_by(&self, sort: SortOptions) -> Vec<&Call> {
        let mut calls: Vec<&Call> = self
            .calls
            .values()
            .filter(|call| self.filters.evaluate(call) == FilterState::Pass)
            .collect();
        calls.sort_by(|a, b| {
            let order = compare_calls(a, b, sort.by);
            let order = if sort.ascending { order } else { order.reverse() };
            order.then_with(|| a.index().cmp(&b.index()))
        });
        calls
    }
}
