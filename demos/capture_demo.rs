// Capture every display and the whole desktop to PNG files

use deskcap::{create_session, CaptureResult, Rect};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        error!("capture demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> CaptureResult<()> {
    let mut session = create_session()?;
    let displays = session.list_displays()?;
    info!("found {} display(s)", displays.len());

    let mut desktop: Option<Rect> = None;
    for screen in &displays {
        info!("display {}: {}", screen.index, screen.bounds);
        desktop = Some(match desktop {
            Some(r) => Rect::new(
                r.min_x.min(screen.bounds.min_x),
                r.min_y.min(screen.bounds.min_y),
                r.max_x.max(screen.bounds.max_x),
                r.max_y.max(screen.bounds.max_y),
            ),
            None => screen.bounds,
        });

        let frame = session.capture_display(screen.index)?;
        save(&frame.to_image(), &format!("display_{}.png", screen.index));
    }

    if let Some(r) = desktop {
        let frame = session.capture(r.min_x, r.min_y, r.width(), r.height())?;
        info!(
            "desktop {}x{} captured at {}",
            frame.width, frame.height, frame.captured_at
        );
        save(&frame.to_image(), "desktop.png");
    }

    session.close();
    Ok(())
}

fn save(image: &image::RgbaImage, path: &str) {
    match image.save(path) {
        Ok(()) => info!("saved {}", path),
        Err(e) => error!("failed to save {}: {}", path, e),
    }
}
