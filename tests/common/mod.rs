use captains_log::recipe;
use courier_rpc::{MethodError, ServiceMethods};
use log::Level;
use rstest::fixture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::runtime::Runtime;

pub struct TestRunner {
    rt: Runtime,
}

impl TestRunner {
    pub fn new() -> Self {
        let _ = recipe::raw_file_logger("/tmp/courier_rpc_test.log", Level::Trace).test().build();
        Self {
            rt: tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap(),
        }
    }

    pub fn block_on<F: Future<Output = ()>>(&self, f: F) {
        self.rt.block_on(f);
    }
}

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AddReq {
    pub a: i32,
    pub b: i32,
}

/// The calc service used across the end-to-end scenarios.
pub fn calc_methods() -> ServiceMethods {
    let mut methods = ServiceMethods::new();
    methods.register("Add", |req: AddReq, ret: &mut i32| {
        *ret = req.a + req.b;
        Ok(())
    });
    methods.register("Div", |req: AddReq, ret: &mut i32| {
        if req.b == 0 {
            return Err(MethodError::from("divide by zero"));
        }
        *ret = req.a / req.b;
        Ok(())
    });
    methods
}
