use miette::IntoDiagnostic;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> miette::Result<()> {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.into_diagnostic()?;

	let result = runtime.block_on(warden_cli::run());

	// stdin is read on a blocking thread, which may be stuck in a read forever
	runtime.shutdown_background();
	result
}
