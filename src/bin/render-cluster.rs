use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use render_cluster::{
    ConfigDef, GpuDescriptor, LoopbackApp, LoopbackCluster, Packet, Resources, Server,
    ServerInbox, ServerSettings, SessionId, Visit,
    foundation::ids::RequestId,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "render-cluster", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an automatic configuration and print its resources and compounds.
    Plan(PlanArgs),
    /// Drive an in-process cluster through a number of frames.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Device descriptor list (JSON).
    #[arg(long)]
    descriptors: PathBuf,

    /// Layout to configure; repeat for several.
    #[arg(long = "layout", default_value = "2D")]
    layouts: Vec<String>,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Configuration definition (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Server settings (JSON). Defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Frames to render.
    #[arg(long, default_value_t = 10)]
    frames: u32,

    /// Simulated render time per task, in milliseconds.
    #[arg(long, default_value_t = 1)]
    frame_time_ms: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Simulate(args) => cmd_simulate(args),
    }
}

fn read_descriptors(path: &Path) -> anyhow::Result<Vec<GpuDescriptor>> {
    GpuDescriptor::list_from_path(path)
        .with_context(|| format!("read descriptors '{}'", path.display()))
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let descriptors = read_descriptors(&args.descriptors)?;
    let layouts: Vec<&str> = args.layouts.iter().map(String::as_str).collect();
    let counter = render_cluster::FrameNameCounter::new();
    let resources = render_cluster::auto_config(&descriptors, &layouts, &counter)
        .with_context(|| "build automatic configuration")?;
    print_resources(&resources);
    Ok(())
}

fn print_resources(r: &Resources) {
    let t = &r.topology;
    println!("resources:");
    for (_, node) in t.nodes.iter() {
        let kind = if node.is_application_node() {
            " (application)"
        } else {
            ""
        };
        println!("  node {}{kind}", node.name);
        for &pipe in node.pipes() {
            println!("    pipe {}", t.pipes[pipe].name);
            for &window in t.pipes[pipe].windows() {
                println!("      window {}", t.windows[window].name);
                for &channel in t.windows[window].channels() {
                    println!("        channel {}", t.channels[channel].name);
                }
            }
        }
    }

    println!("compounds:");
    let c = &r.compounds;
    for &root in c.roots() {
        let mut depth = Vec::new();
        c.walk(root, &mut |id, compound| {
            while depth.last().is_some_and(|&p| Some(p) != compound.parent()) {
                depth.pop();
            }
            let channel = c
                .channel(id)
                .map(|ch| t.channels[ch].name.as_str())
                .unwrap_or("-");
            let name = if compound.name.is_empty() {
                "<group>"
            } else {
                compound.name.as_str()
            };
            println!(
                "  {:indent$}{name} [{channel}] eyes={:?} range={:.3}..{:.3} frames in={} out={}",
                "",
                compound.eyes,
                compound.range.start,
                compound.range.end,
                compound.input_frames.len(),
                compound.output_frames.len(),
                indent = depth.len() * 2,
            );
            depth.push(id);
            Visit::Continue
        });
    }
}

/// Application side of the simulation: issues commands and awaits their replies.
struct Driver {
    app: Arc<LoopbackApp>,
    next_request: u32,
    timeout: Duration,
}

impl Driver {
    fn request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn call(
        &mut self,
        packet: impl FnOnce(RequestId) -> Packet,
        is_reply: impl Fn(&Packet, RequestId) -> bool,
    ) -> anyhow::Result<Packet> {
        let request = self.request();
        self.app.command(packet(request))?;
        self.app
            .wait_for(self.timeout, |p| is_reply(p, request))
            .with_context(|| format!("no reply to request {}", request.0))
    }

    fn wait_frame(&self, frame: u32) -> anyhow::Result<()> {
        self.app
            .wait_for(self.timeout, |p| {
                matches!(p, Packet::ConfigFrameFinished { frame: f, .. } if *f >= frame)
            })
            .with_context(|| format!("frame {frame} never finished"))?;
        Ok(())
    }
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let settings = match &args.settings {
        Some(path) => ServerSettings::from_path(path)?,
        None => ServerSettings::default(),
    };
    let def = ConfigDef::from_path(&args.config)?;
    let latency = def.latency.unwrap_or(settings.latency);

    let (inbox, queue) = ServerInbox::channel();
    let cluster = Arc::new(
        LoopbackCluster::new(inbox.clone())
            .with_frame_time(Duration::from_millis(args.frame_time_ms)),
    );
    let mut server = Server::new(settings.clone(), cluster.clone(), inbox.clone(), queue);
    server
        .load_config(def)
        .with_context(|| format!("load configuration '{}'", args.config.display()))?;

    let server = thread::Builder::new()
        .name("render-cluster-server".to_owned())
        .spawn(move || server.run())
        .with_context(|| "spawn server thread")?;

    let app = LoopbackApp::new("application", inbox);
    let mut driver = Driver {
        app: Arc::clone(&app),
        next_request: 0,
        timeout: settings.launch_timeout() + settings.reply_timeout(),
    };

    let reply = driver.call(
        |request| Packet::ChooseConfig {
            request,
            renderer_info: ".#render-client".to_owned(),
        },
        |p, r| matches!(p, Packet::ChooseConfigReply { request, .. } if *request == r),
    )?;
    let Packet::ChooseConfigReply {
        session: Some(session),
        ..
    } = reply
    else {
        anyhow::bail!("server has no configuration to offer");
    };

    let reply = driver.call(
        |request| Packet::ConfigInit {
            session,
            request,
            init_id: 1,
        },
        |p, r| matches!(p, Packet::ConfigInitReply { request, .. } if *request == r),
    )?;
    if let Packet::ConfigInitReply {
        result: false,
        error,
        ..
    } = reply
    {
        anyhow::bail!("config init failed: {error}");
    }

    for frame in 1..=args.frames {
        driver.call(
            |request| Packet::ConfigStartFrame {
                session,
                request,
                frame_id: frame,
            },
            |p, r| matches!(p, Packet::ConfigStartFrameReply { request, .. } if *request == r),
        )?;
        if frame > latency {
            driver.wait_frame(frame - latency)?;
        }
    }
    driver.wait_frame(args.frames)?;

    let version = app
        .received()
        .iter()
        .rev()
        .find_map(|p| match p {
            Packet::ConfigSync { version } => Some(*version),
            _ => None,
        })
        .unwrap_or_default();

    shutdown(&mut driver, session)?;
    server
        .join()
        .map_err(|_| anyhow::anyhow!("server thread panicked"))??;

    println!(
        "finished {} frames, version {version}, {} render clients launched",
        args.frames,
        cluster.launched().len()
    );
    Ok(())
}

fn shutdown(driver: &mut Driver, session: SessionId) -> anyhow::Result<()> {
    driver.call(
        |request| Packet::ConfigExit { session, request },
        |p, r| matches!(p, Packet::ConfigExitReply { request, .. } if *request == r),
    )?;
    driver.call(
        |request| Packet::ReleaseConfig { request, session },
        |p, r| matches!(p, Packet::ReleaseConfigReply { request } if *request == r),
    )?;
    let reply = driver.call(
        |request| Packet::Shutdown { request },
        |p, r| matches!(p, Packet::ShutdownReply { request, .. } if *request == r),
    )?;
    if !matches!(reply, Packet::ShutdownReply { result: true, .. }) {
        anyhow::bail!("server refused to shut down");
    }
    Ok(())
}
