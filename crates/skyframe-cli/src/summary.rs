use console::Style;
use skyframe_core::{Instrument, ReadOptions, ReadResult};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    good: Style,
    warn: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            good: Style::new().green(),
            warn: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn flag(s: &Styles, on: bool) -> String {
    if on {
        s.good.apply_to("yes").to_string()
    } else {
        s.label.apply_to("no").to_string()
    }
}

pub fn print_read_plan(instrument: Instrument, file_count: usize, options: &ReadOptions) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Skyframe Read"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(13)));
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Instrument"),
        s.value.apply_to(instrument)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Files"),
        s.value.apply_to(file_count)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Workers"),
        s.value.apply_to(options.worker_count())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("First frame"),
        flag(&s, options.first_frame)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Metadata"),
        flag(&s, !options.no_metadata)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scratch"),
        s.path.apply_to(options.scratch_dir.display())
    );
    println!();
}

pub fn print_read_summary(result: &ReadResult) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(result.frame_count())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Shape"),
        s.value.apply_to(format!("{:?}", result.images.shape()))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Type"),
        s.value.apply_to(result.images.pixel_type())
    );
    println!();

    if result.problematic.is_empty() {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Problems"),
            s.good.apply_to("none")
        );
    } else {
        println!(
            "  {} ({})",
            s.header.apply_to("Problems"),
            s.warn.apply_to(result.problematic.len())
        );
        for problem in &result.problematic {
            println!(
                "    {}  {}",
                s.path.apply_to(problem.filename.display()),
                s.warn.apply_to(&problem.error_message)
            );
        }
    }
    println!();
}
