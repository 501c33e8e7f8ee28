pub mod defaults;
pub mod instances;
pub mod prelabel;
pub mod resolve;
pub mod templates;

pub use defaults::resolve_default_for_template;
pub use instances::InstanceManager;
pub use prelabel::submit_prelabel;
pub use resolve::{
    list_for_instance, list_for_template, resolve_for_instance, resolve_for_template,
    resolve_or_default_for_template, RegistryError, ResolveResult,
};
pub use templates::TemplateManager;
