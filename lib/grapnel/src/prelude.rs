//! Prelude module for convenient imports.
//!
//! ```
//! use grapnel::prelude::*;
//! ```

pub use crate::{
    ApiClient, Arg, ArgType, BodySerialization, CancelHandle, CancelSignal, ClientConfig,
    CollectionFormat, Content, Error, HttpClient, HyperClient, Method, MethodDescriptor,
    MultipartItem, Outcome, Request, Response, RestInterface, Result, ReturnShape,
    ServiceDefinition, StatusCode, header,
};
pub use serde::{Deserialize, Serialize};
