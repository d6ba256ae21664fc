//! Request dispatch: trigger detection through handler invocation.

mod core;

pub use core::{
    handler_fn, Dispatcher, Handler, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS,
};
