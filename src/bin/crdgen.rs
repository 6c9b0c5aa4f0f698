//! # CRD Generator
//!
//! Generates Kubernetes CustomResourceDefinition (CRD) YAML from Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/opa-system-controller.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use opa_system_controller::crd::{GlobalDatasource, Library, System};

fn main() {
    let crds = [System::crd(), Library::crd(), GlobalDatasource::crd()];
    for (index, crd) in crds.iter().enumerate() {
        if index > 0 {
            println!("---");
        }
        match serde_yaml::to_string(crd) {
            Ok(yaml) => print!("{yaml}"),
            Err(e) => {
                eprintln!("Error: Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
