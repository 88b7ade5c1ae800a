use clap::Parser;
use mclksync::{
    cli::{DumpArgs, GenerateArgs},
    create_scheduler, event_channel, handle_device_list,
    logging,
    midi::{ClockGenerator, ClockRecoverer, MidirInput, MidirOutput},
    shutdown::install_signal_handlers,
    transport::{input::spawn_command_reader, timing::SoftTransport},
    ui::ConsolePresenter,
    validate_device, Args, CancellationToken, Command, CycleDriver, EventLoop, Result, Scheduler,
    Settings,
};

fn main() {
    let args = parse_command_line_arguments();

    if args.device_list {
        list_available_devices(&get_available_devices());
        return;
    }

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn parse_command_line_arguments() -> Args {
    Args::parse()
}

fn get_available_devices() -> Vec<String> {
    handle_device_list()
}

fn list_available_devices(devices: &[String]) {
    println!("Available MIDI devices:");
    for device in devices {
        println!("  - {}", device);
    }
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    logging::init_logger(settings.log_level)?;
    log::info!("Application starting");

    match args.command {
        Some(Command::Generate(generate)) => {
            let settings = generate.apply(settings).validated();
            run_generator(&generate, &settings)
        }
        Some(Command::Dump(dump)) => {
            let settings = dump.apply(settings).validated();
            run_dump(&dump, &settings)
        }
        None => {
            println!("Nothing to do, try `mclksync --help`");
            Ok(())
        }
    }
}

fn check_device(port: Option<&str>) -> Result<()> {
    if let Some(name) = port {
        if let Err(error_msg) = validate_device(name, &get_available_devices()) {
            eprintln!("{}", error_msg);
            return Err(mclksync::Error::DeviceNotFound(name.to_string()));
        }
    }
    Ok(())
}

fn run_generator(args: &GenerateArgs, settings: &Settings) -> Result<()> {
    check_device(args.port.as_deref())?;
    let output = MidirOutput::connect(args.port.as_deref())?;

    let token = CancellationToken::new();
    install_signal_handlers(token.clone(), None)?;

    let (tx, rx) = crossbeam::channel::unbounded();
    spawn_command_reader(tx, token.clone())?;

    let transport = SoftTransport::new(
        settings.sample_rate,
        settings.host_bpm,
        args.meter,
        settings.timecode,
    );
    let generator = ClockGenerator::new(settings.generator_config());
    let mut driver = CycleDriver::new(transport, generator, output, settings.period);

    println!("Commands: play, stop, locate BAR [BEAT], tempo BPM, quit");
    let result = driver.run(&rx, &token);
    // a failed send ends the session for every thread
    token.cancel();
    result
}

fn run_dump(args: &DumpArgs, settings: &Settings) -> Result<()> {
    check_device(args.port.as_deref())?;

    let (producer, consumer) = event_channel(settings.channel_capacity);
    let token = CancellationToken::new();
    install_signal_handlers(token.clone(), Some(consumer.waker()))?;

    let _input = MidirInput::connect(args.port.as_deref(), producer, settings.sample_rate)?;

    let recoverer = ClockRecoverer::new(settings.recoverer_config());
    let presenter = ConsolePresenter::new(settings.newline);
    let worker_token = token.clone();
    let worker = create_scheduler().spawn("mclk-dump", move || {
        let mut event_loop = EventLoop::new(consumer, recoverer, presenter);
        event_loop.run(&worker_token);
        event_loop.into_sink().finish();
    })?;

    log::info!("Dumping MIDI clock. Press Ctrl+C to exit...");
    println!("Press Ctrl+C to exit...");
    if worker.join().is_err() {
        log::error!("Dump worker panicked");
    }
    Ok(())
}
