fn main() -> std::io::Result<()> {
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(
            &["vendor/cri-api/runtime/v1/api.proto"],
            &["vendor/cri-api"],
        )?;

    Ok(())
}
