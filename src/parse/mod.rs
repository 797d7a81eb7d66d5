pub mod template;
pub mod types;

pub use template::{Value, parse, parse_with};
pub use types::{
    Fragment, FragmentChain, FragmentFlags, ParsedCommand, ParsedTemplate, RedirectSpec, Stream,
    TargetKind,
};
