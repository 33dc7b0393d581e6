use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::EnvFilter;

use penrose_lsystem::{
    Canvas, Config, Grammar, Playback, DEFAULT_CONFIG_PATH, MAX_GENERATIONS, PRESET_NAMES,
    save_png, spawn_visualizer, to_degrees, to_radians
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("penrose_lsystem=info,penrose=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn parse<T: std::str::FromStr>(arg: Option<&str>, usage: &str) -> Option<T> {
    match arg.and_then(|a| a.parse().ok()) {
        Some(value) => Some(value),
        None => {
            println!("usage: {}\n", usage);
            None
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&path)?;
    let playback = Arc::new(Mutex::new(Playback::from_config(&config)?));

    let visualizer = spawn_visualizer(Arc::clone(&playback), &config);

    println!("\n╭──────────────────────────────────────────╮");
    println!("│          penrose l-system player         │");
    println!("│                                          │");
    println!("│ /state               progress + params   │");
    println!("│ /gen <n>             regenerate grammar  │");
    println!("│ /preset <name>       switch grammar      │");
    println!("│ /rotate <deg>        pattern heading     │");
    println!("│ /speed <rad/tick>    spin second frame   │");
    println!("│ /budget <steps>      symbols per tick    │");
    println!("│ /instant  /dual  /theme  /reset          │");
    println!("│ /snapshot <file.png> export full drawing │");
    println!("│ /quit                                    │");
    println!("╰──────────────────────────────────────────╯\n");

    loop {
        if visualizer.is_finished() {
            break;
        }

        print!("penrose: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let mut words = input.split_whitespace();
        let Some(command) = words.next() else { continue };
        let arg = words.next();

        let mut playback = playback.lock().unwrap_or_else(PoisonError::into_inner);
        match command {
            "/quit" => break,
            "/state" => {
                let (cursor, total) = playback.progress();
                let params = *playback.controller().params();
                let engine = playback.engine();
                println!("step {} of {} | generation {} | draw length {:.3}",
                         cursor, total, engine.generation(), engine.draw_length());
                println!("segments {} | budget {} | rotation {:.1}° | speed {} | instant {} | dual {} | theme {:?}",
                         playback.primary().buffer().len(), params.step_budget,
                         to_degrees(params.rotation_offset), params.rotation_speed,
                         params.instant, params.dual, playback.theme());
                if let Some(state) = playback.primary().state() {
                    println!("stack depth {} | unmatched pops {}\n", state.depth(), state.unmatched_pops);
                } else {
                    println!();
                }
            }
            "/gen" => {
                if let Some(g) = parse::<u32>(arg, "/gen <generations>") {
                    if g > MAX_GENERATIONS {
                        println!("generations are capped at {}\n", MAX_GENERATIONS);
                    } else {
                        playback.set_generations(g);
                        println!("regenerated: {} symbols\n", playback.engine().len());
                    }
                }
            }
            "/preset" => match Grammar::preset(arg.unwrap_or_default()) {
                Ok(grammar) => {
                    playback.set_grammar(grammar);
                    println!("grammar switched: {} symbols\n", playback.engine().len());
                }
                Err(e) => println!("{} (available: {})\n", e, PRESET_NAMES.join(", ")),
            },
            "/rotate" => {
                if let Some(deg) = parse::<f64>(arg, "/rotate <degrees>") {
                    playback.set_rotation(to_radians(deg));
                }
            }
            "/speed" => {
                if let Some(speed) = parse::<f64>(arg, "/speed <radians per tick>") {
                    playback.set_rotation_speed(speed);
                }
            }
            "/budget" => {
                if let Some(budget) = parse::<usize>(arg, "/budget <steps per tick>") {
                    playback.set_step_budget(budget);
                }
            }
            "/instant" => {
                let instant = !playback.controller().params().instant;
                playback.set_instant(instant);
                println!("instant mode {}\n", if instant { "on" } else { "off" });
            }
            "/dual" => {
                let dual = !playback.controller().params().dual;
                playback.set_dual(dual);
                println!("dual pattern {}\n", if dual { "on" } else { "off" });
            }
            "/theme" => {
                let theme = playback.theme().toggled();
                playback.set_theme(theme);
            }
            "/reset" => {
                playback.reset();
                println!("playback reset\n");
            }
            "/snapshot" => {
                let Some(file) = arg else {
                    println!("usage: /snapshot <file.png>\n");
                    continue;
                };
                let mut canvas = Canvas::from_config(&config);
                canvas.set_theme(playback.theme());
                if let Some(bounds) = playback.primary().buffer().bounds() {
                    canvas.fit(bounds);
                }
                canvas.redraw(playback.primary().buffer(), playback.secondary().buffer(), playback.spin());
                match save_png(&canvas, file) {
                    Ok(()) => println!("saved {}\n", file),
                    Err(e) => println!("snapshot failed: {}\n", e),
                }
            }
            _ => println!("unknown command\n"),
        }
    }

    if visualizer.is_finished() {
        match visualizer.join() {
            Ok(Err(e)) => eprintln!("visualizer error: {}", e),
            Err(_) => eprintln!("visualizer panicked"),
            Ok(Ok(())) => {}
        }
    }

    Ok(())
}
