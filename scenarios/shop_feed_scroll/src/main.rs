use perf_harness_runner::prelude::*;
use std::time::Duration;

const FEED_SWIPES: usize = 10;

#[derive(Debug, Default)]
struct ScenarioValues {
    items_scrolled: usize,
}

impl UserValuesConstraint for ScenarioValues {}

fn setup(ctx: &mut RunnerContext<ScenarioValues>) -> HookResult {
    // Start from a cold launch so the first step measures the app start.
    ctx.stop_app().ok();
    Ok(())
}

fn launch(ctx: &mut RunnerContext<ScenarioValues>) -> HookResult {
    ctx.start_app()?;
    ctx.device()
        .wait_for(&Selector::text("Recommended"), Duration::from_secs(10))?;
    Ok(())
}

fn scroll_feed(ctx: &mut RunnerContext<ScenarioValues>) -> HookResult {
    for _ in 0..FEED_SWIPES {
        ctx.device().swipe_up()?;
        ctx.device().wait(Duration::from_millis(500));
        ctx.get_mut().items_scrolled += 1;
    }
    log::info!("Scrolled the feed {} times", ctx.get().items_scrolled);

    Ok(())
}

fn open_product(ctx: &mut RunnerContext<ScenarioValues>) -> HookResult {
    ctx.device().tap_on(&Selector::id("product_card"))?;
    ctx.device().wait(Duration::from_secs(2));
    ctx.device().press_back()?;
    Ok(())
}

fn open_cart(ctx: &mut RunnerContext<ScenarioValues>) -> HookResult {
    ctx.device().tap_on(&Selector::text("Cart"))?;
    if ctx.device().exists(&Selector::text_contains("Your cart is empty"))? {
        log::warn!("The cart is empty, checkout timings will not be representative");
    }
    ctx.device().wait(Duration::from_secs(2));
    Ok(())
}

fn main() -> HarnessResult<()> {
    let builder = ScenarioDefinitionBuilder::<ScenarioValues>::new_with_init(env!(
        "CARGO_PKG_NAME"
    ))
    .with_app("com.example.shop", "Shop")
    .use_setup(setup)
    .add_step("launch", "Cold start the app to the home feed", 10, launch)
    .add_step("scroll_feed", "Scroll down the recommended feed", 15, scroll_feed)
    .add_step("open_product", "Open the first product and go back", 10, open_product)
    .add_step("open_cart", "Open the shopping cart", 5, open_cart)
    .use_teardown(|ctx| {
        ctx.stop_app().ok();
        Ok(())
    });

    run(builder)?;

    Ok(())
}
