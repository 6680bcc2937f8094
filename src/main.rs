use std::f32::consts::FRAC_PI_6;

use glam::Vec3;
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lumentile::ecs::EntityDesc;
use lumentile::resources::texture_cache::MemoryImageSource;
use lumentile::tiles::{TILE_SIZE, TILE_TEXTURE_PX};
use lumentile::{EngineBuilder, EngineConfig, EngineResult, LightComponent};

// ── Procedural demo ─────────────────────────────────────────────────────────

const DEMO_ROWS: usize = 40;
const DEMO_COLS: usize = 56;
const TILESET: &str = "demo/tiles.png";

/// Base colours of the four ground tiles, left to right in the tileset.
const GROUND: [[u8; 3]; 4] = [
    [58, 110, 52],  // grass
    [112, 108, 100], // stone
    [40, 70, 140],  // water
    [190, 170, 110], // sand
];

fn noisy_tile(rng: &mut StdRng, base: [u8; 3], img: &mut RgbaImage, x0: u32) {
    for y in 0..TILE_TEXTURE_PX {
        for x in 0..TILE_TEXTURE_PX {
            let jitter: i16 = rng.random_range(-18..=18);
            let c = base.map(|v| (v as i16 + jitter).clamp(0, 255) as u8);
            img.put_pixel(x0 + x, y, Rgba([c[0], c[1], c[2], 255]));
        }
    }
}

/// Bumpy normal map: flat with random tilts, encoded as `n * 0.5 + 0.5`.
fn bumpy_normals(rng: &mut StdRng) -> RgbaImage {
    RgbaImage::from_fn(TILE_TEXTURE_PX, TILE_TEXTURE_PX, |_, _| {
        let n = Vec3::new(rng.random_range(-0.3..0.3), rng.random_range(-0.3..0.3), 1.0).normalize();
        let e = (n * 0.5 + Vec3::splat(0.5)) * 255.0;
        Rgba([e.x as u8, e.y as u8, e.z as u8, 255])
    })
}

fn demo_images(rng: &mut StdRng) -> MemoryImageSource {
    let mut tileset = RgbaImage::new(TILE_TEXTURE_PX * GROUND.len() as u32, TILE_TEXTURE_PX);
    for (i, base) in GROUND.iter().enumerate() {
        noisy_tile(rng, *base, &mut tileset, i as u32 * TILE_TEXTURE_PX);
    }

    let lamp = RgbaImage::from_fn(TILE_TEXTURE_PX, TILE_TEXTURE_PX, |x, y| {
        let d = (x as i32 - 8).pow(2) + (y as i32 - 8).pow(2);
        if d < 20 { Rgba([250, 230, 160, 255]) } else { Rgba([60, 60, 64, 255]) }
    });
    // Height is stored inverted: darker texels stand taller.
    let lamp_height = RgbaImage::from_fn(TILE_TEXTURE_PX, TILE_TEXTURE_PX, |x, y| {
        let d = ((x as i32 - 8).pow(2) + (y as i32 - 8).pow(2)) as f32;
        let v = (d / 128.0).min(1.0) * 255.0;
        Rgba([v as u8, v as u8, v as u8, 255])
    });

    MemoryImageSource::new()
        .with(TILESET, tileset)
        .with("demo/bumps.png", bumpy_normals(rng))
        .with("demo/lamp.png", lamp)
        .with("demo/lamp_h.png", lamp_height)
}

/// Random ground with a lamp roughly every 90 cells.
fn demo_map(rng: &mut StdRng) -> String {
    let symbols = ["G", "S", "W", "D"];
    let tiles: Vec<Vec<&str>> = (0..DEMO_ROWS)
        .map(|_| {
            (0..DEMO_COLS)
                .map(|_| if rng.random_range(0..90) == 0 { "L" } else { symbols[rng.random_range(0..symbols.len())] })
                .collect()
        })
        .collect();

    let mut tile_types = serde_json::Map::new();
    for (i, symbol) in symbols.iter().enumerate() {
        tile_types.insert(
            symbol.to_string(),
            serde_json::json!({
                "texture": TILESET,
                "xTextureCoords": i as u32 * TILE_TEXTURE_PX,
                "yTextureCoords": 0,
                "material": { "ambient": 0.4 },
            }),
        );
    }

    serde_json::json!({
        "tiles": tiles,
        "tileTypes": tile_types,
        "objectTypes": {
            "L": {
                "diffuse": "demo/lamp.png",
                "normal": "demo/bumps.png",
                "height": "demo/lamp_h.png",
                "material": { "ambient": 0.6 },
                "pointLight": {
                    "height": 40.0,
                    "color": [1.0, 0.8, 0.5],
                    "aAttenuation": 0.002,
                    "bAttenuation": 0.0001
                }
            }
        }
    })
    .to_string()
}

fn spotlights(rng: &mut StdRng) -> Vec<EntityDesc> {
    let half_w = DEMO_COLS as f32 * TILE_SIZE * 0.5;
    let half_h = DEMO_ROWS as f32 * TILE_SIZE * 0.5;
    (0..3)
        .map(|_| {
            let position = Vec3::new(
                rng.random_range(-half_w..half_w),
                rng.random_range(-half_h..half_h),
                80.0,
            );
            let direction = Vec3::new(1.0, 0.0, -1.0).normalize();
            EntityDesc::light(LightComponent::spot(position, direction, FRAC_PI_6, Vec3::new(0.6, 0.7, 1.0), 0.001, 0.00005))
        })
        .collect()
}

// ── Entry point ─────────────────────────────────────────────────────────────

struct Args {
    config: Option<String>,
    map: Option<String>,
    debug: bool,
}

fn parse_args() -> Args {
    let mut args = Args { config: None, map: None, debug: false };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--debug" => args.debug = true,
            _ => args.map = Some(arg),
        }
    }
    args
}

fn run() -> EngineResult<()> {
    let args = parse_args();
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let builder = EngineBuilder::new().with_config(config);
    let builder = if args.debug { builder.with_debug_outline(true) } else { builder };

    match args.map {
        Some(map) => builder.with_map_file(map).run(),
        None => {
            log::info!("no map given, generating a {DEMO_COLS}x{DEMO_ROWS} demo");
            let mut rng = StdRng::seed_from_u64(0x7117);
            let images = demo_images(&mut rng);
            let map = demo_map(&mut rng);
            let spots = spotlights(&mut rng);
            builder
                .with_title("lumentile demo")
                .with_image_source(Box::new(images))
                .with_setup(move |engine| {
                    engine.load_map_json(&map)?;
                    for spot in spots {
                        engine.add_entity(spot);
                    }
                    Ok(())
                })
                .run()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
