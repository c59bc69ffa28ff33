fn main() {
    println!("cargo:rerun-if-env-changed=TPM_CLEAR_BUILD_STATIC");
    if let Ok(build_static) = std::env::var("TPM_CLEAR_BUILD_STATIC") {
        if matches!(
            build_static.to_lowercase().as_str(),
            "1" | "y" | "yes" | "true"
        ) {
            println!("cargo:rustc-link-arg=-l:libc.a");
            println!("cargo:rustc-link-arg=-l:libtss2-tcti-device.a");
            //println!("cargo:rustc-link-arg=-l:libtss2-tcti-mssim.a");
            //println!("cargo:rustc-link-arg=-l:libtss2-tcti-swtpm.a");
            println!("cargo:rustc-link-lib=static=crypto");
            println!("cargo:rustc-link-lib=static=ssl");
            println!("cargo:rustc-link-lib=static=tss2-esys");
            println!("cargo:rustc-link-lib=static=tss2-mu");
            println!("cargo:rustc-link-lib=static=tss2-sys");
            println!("cargo:rustc-link-search=/usr/lib");
            println!("cargo:rustc-link-search=/usr/local/ssl/lib");
        }
    }
}
