pub mod debounce;
pub mod dump;
pub mod engine;
pub mod export;
pub mod filter;
pub mod groups;
pub mod html;
pub mod io;
pub mod predicates;
pub mod record;
pub mod repl;
pub mod report;
pub mod stats;
pub mod table;
pub mod tags;
pub mod uac;
pub mod view;

pub mod prelude {
    pub use crate::engine::{Engine, ResultCounter};
    pub use crate::filter::{FilterState, GeneralFilter, LdapAttributeFilter, UacCombine};
    pub use crate::record::{AttributeSource, Record};
    pub use crate::uac::UacFlagSpec;
    pub use crate::view::View;
}
