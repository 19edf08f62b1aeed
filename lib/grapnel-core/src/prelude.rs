//! Prelude module for convenient imports.
//!
//! ```
//! use grapnel_core::prelude::*;
//! ```

pub use crate::{
    Arg, ArgType, BodySerialization, CancelHandle, CancelSignal, CollectionFormat, Content, Error,
    FieldRule, FormRules, HttpClient, Method, MethodDescriptor, MultipartItem, Outcome, Request,
    Response, RestInterface, Result, ReturnShape, ServiceDefinition,
};
