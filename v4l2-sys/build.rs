extern crate bindgen;

use std::env;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");

    let extra_include_paths = if cfg!(target_os = "freebsd") {
        assert!(
            Path::new("/usr/local/include/linux/videodev2.h").exists(),
            "Video4Linux `videodev2.h` UAPI header is required to generate bindings \
            and the header file is missing.\n\
            Consider installing `multimedia/v4l_compat` FreeBSD package."
        );
        vec!["-I/usr/local/include"]
    } else {
        vec![]
    };

    // Only the uapi structs and constants are needed; anything they reference
    // (timeval, fixed width integer aliases) is pulled in transitively.
    let bindings = bindgen::Builder::default()
        .header("wrapper.h")
        .clang_args(extra_include_paths)
        .allowlist_type("v4l2_.*")
        .allowlist_var("V4L2_.*")
        .derive_default(false)
        .generate()
        .expect("Failed to generate bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("v4l2_bindings.rs"))
        .expect("Failed to write bindings");
}
