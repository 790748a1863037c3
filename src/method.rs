use crate::codec::{Codec, CodecExt};
use crate::error::{CodecError, MethodError};
use serde::{de::DeserializeOwned, Serialize};
use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

/// Why an invocation failed; the server maps each case onto an HTTP
/// status.
#[derive(Debug)]
pub(crate) enum InvokeError {
    /// Argument bytes do not decode into the declared argument type.
    Arg(CodecError),
    /// The method body reported failure.
    Method(MethodError),
    /// The return value failed to encode.
    Ret(CodecError),
}

type HandlerFn = dyn Fn(&dyn Codec, &[u8]) -> Result<Vec<u8>, InvokeError> + Send + Sync;

/// One callable method: its name, declared argument/return types, and the
/// erased decode-invoke-encode pipeline bound to the registered function.
pub struct Method {
    name: String,
    arg_type: &'static str,
    ret_type: &'static str,
    handler: Box<HandlerFn>,
}

impl Method {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn arg_type(&self) -> &'static str {
        self.arg_type
    }

    #[inline]
    pub fn ret_type(&self) -> &'static str {
        self.ret_type
    }

    #[inline]
    pub(crate) fn invoke(&self, codec: &dyn Codec, body: &[u8]) -> Result<Vec<u8>, InvokeError> {
        (self.handler)(codec, body)
    }
}

/// Registration table for one service.
///
/// Every method takes its argument by value and writes its result through
/// a `&mut` out-slot seeded with `Ret::default()`, reporting failure with
/// a single error value:
///
/// ```
/// use courier_rpc::{MethodError, ServiceMethods};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct AddReq { a: i32, b: i32 }
///
/// let mut methods = ServiceMethods::new();
/// methods.register("Add", |req: AddReq, ret: &mut i32| {
///     *ret = req.a + req.b;
///     Ok(())
/// });
/// methods.register("Div", |req: AddReq, ret: &mut i32| {
///     if req.b == 0 {
///         return Err(MethodError::from("division by zero"));
///     }
///     *ret = req.a / req.b;
///     Ok(())
/// });
/// ```
///
/// The table freezes into an immutable snapshot at server construction;
/// afterwards it is only read, concurrently and lock-free.
#[derive(Default)]
pub struct ServiceMethods {
    methods: HashMap<String, Method>,
}

impl ServiceMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` as the callable named `name`. A later registration
    /// under the same name replaces the earlier one.
    pub fn register<Arg, Ret, F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        Arg: DeserializeOwned + 'static,
        Ret: Serialize + Default + 'static,
        F: Fn(Arg, &mut Ret) -> Result<(), MethodError> + Send + Sync + 'static,
    {
        let name = name.into();
        let handler = move |codec: &dyn Codec, body: &[u8]| -> Result<Vec<u8>, InvokeError> {
            let arg: Arg = codec.decode(body).map_err(InvokeError::Arg)?;
            let mut ret = Ret::default();
            f(arg, &mut ret).map_err(InvokeError::Method)?;
            codec.encode(&ret).map_err(InvokeError::Ret)
        };
        self.methods.insert(
            name.clone(),
            Method {
                name,
                arg_type: type_name::<Arg>(),
                ret_type: type_name::<Ret>(),
                handler: Box::new(handler),
            },
        );
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub(crate) fn freeze(self) -> Arc<HashMap<String, Method>> {
        Arc::new(self.methods)
    }
}
