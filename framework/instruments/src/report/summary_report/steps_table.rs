use tabled::Tabled;

#[derive(Tabled)]
pub struct StepRow {
    #[tabled(rename = "#")]
    pub step_index: usize,
    pub step: String,
    #[tabled(display = "float2")]
    pub expected_s: f64,
    #[tabled(display = "float2")]
    pub elapsed_s: f64,
    pub overran: bool,
    pub status: &'static str,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}
