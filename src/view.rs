//! View controller: which view is active and which controls go with it.
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum View {
    /// Card per object
    #[default]
    Detail,
    /// One row per object
    Table,
    /// Read-only statistics, filters hidden
    Stats,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            View::Detail => "detail",
            View::Table => "table",
            View::Stats => "stats",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    ExpandAll,
    CollapseAll,
    GroupBy,
    ExportCsv,
}

/// What the chrome around the active view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewChrome {
    pub active: View,
    pub controls: Vec<Control>,
    pub filters_visible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ViewController {
    active: View,
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> View {
        self.active
    }

    pub fn switch_view(&mut self, target: View) -> ViewChrome {
        if self.active != target {
            log::debug!("switching view {} -> {}", self.active, target);
        }
        self.active = target;
        self.chrome()
    }

    pub fn chrome(&self) -> ViewChrome {
        let controls = match self.active {
            View::Detail => vec![Control::ExpandAll, Control::CollapseAll, Control::GroupBy],
            View::Table => vec![Control::ExportCsv],
            View::Stats => Vec::new(),
        };
        ViewChrome {
            active: self.active,
            controls,
            filters_visible: self.active != View::Stats,
        }
    }
}
