use indicatif::ProgressBar;

pub struct RoutingProgress {
    bar: ProgressBar,
}

impl RoutingProgress {
    pub fn new(count: usize) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        bar.set_message(format!("Routing {} issue(s)...", count));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
