use perf_harness_runner::prelude::*;
use std::time::Duration;

fn launch(ctx: &mut RunnerContext<()>) -> HookResult {
    ctx.start_app()?;
    ctx.device()
        .wait_for(&Selector::id("search_bar"), Duration::from_secs(10))?;
    Ok(())
}

fn search_destination(ctx: &mut RunnerContext<()>) -> HookResult {
    ctx.device()
        .input_on(&Selector::id("search_bar"), "Central Station")?;
    ctx.device()
        .tap_on(&Selector::text_contains("Central Station").and(Selector::node_type("ListItem")))?;
    ctx.device().wait(Duration::from_secs(3));
    Ok(())
}

fn plan_route(ctx: &mut RunnerContext<()>) -> HookResult {
    ctx.device().tap_on(&Selector::text("Directions"))?;
    ctx.device()
        .wait_for(&Selector::text_contains("min"), Duration::from_secs(15))?;
    Ok(())
}

// Navigation hands off to the location and audio services, so sample every process.
fn start_navigation(ctx: &mut RunnerContext<()>) -> HookResult {
    ctx.device().tap_on(&Selector::text("Start"))?;
    ctx.device().wait(Duration::from_secs(10));
    ctx.device().press_back()?;
    Ok(())
}

fn main() -> HarnessResult<()> {
    let builder = ScenarioDefinitionBuilder::<()>::new_with_init(env!("CARGO_PKG_NAME"))
        .with_app("com.example.maps", "Maps")
        .add_step("launch", "Start the app to the map view", 10, launch)
        .add_step(
            "search_destination",
            "Search for a destination and select it",
            10,
            search_destination,
        )
        .add_step("plan_route", "Plan a driving route", 20, plan_route)
        .add_step_all_processes(
            "start_navigation",
            "Run turn by turn navigation for a while",
            20,
            start_navigation,
        )
        .use_teardown(|ctx| {
            ctx.stop_app().ok();
            Ok(())
        });

    run(builder)?;

    Ok(())
}
