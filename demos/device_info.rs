use v4l_capture::context;
use v4l_capture::Device;

fn main() -> v4l_capture::Result<()> {
    env_logger::init();

    let nodes = context::enum_devices();
    if nodes.is_empty() {
        println!("No video devices found");
        return Ok(());
    }

    for node in nodes {
        println!(
            "{}: {}",
            node.path().display(),
            node.name().unwrap_or_else(|| "<unknown>".to_string())
        );

        let dev = match Device::with_path(node.path()) {
            Ok(dev) => dev,
            Err(e) => {
                println!("  {}\n", e);
                continue;
            }
        };
        println!("{}", dev.info());

        for name in dev.control_names() {
            match dev.get_control(name) {
                Ok(value) => println!("  {:<32} = {:?}", name, value),
                Err(e) => println!("  {:<32} ({})", name, e),
            }
        }
        println!();
    }

    Ok(())
}
