fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc (and its well-known types) unless the
    // environment provides one
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }
    let well_known = protoc_bin_vendored::include_path().map_err(|e| e.to_string())?;

    println!("cargo:rerun-if-changed=proto/rate_service.proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &["proto/rate_service.proto"],
            &[std::path::PathBuf::from("proto"), well_known],
        )?;
    Ok(())
}
