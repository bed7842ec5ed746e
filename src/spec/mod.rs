mod model;
mod reader;

pub use model::{
    Components, LoadedSpec, MediaType, Operation, OperationSpec, Parameter, RequestBody,
    RequestParameters, RequestSpec, ResolvedOperation, Response, Schema, SecurityScheme, Server,
    SpecDocument, HTTP_METHODS,
};
pub use reader::{is_spec_file, load_spec, parse_spec_value, read_document};
