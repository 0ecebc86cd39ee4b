use crate::infra::{demo_service, parse_date, DemoBackend};
use chrono::{Datelike, Local, NaiveDate, Weekday};
use clap::Args;
use holiday_quote::config::EngineConfig;
use holiday_quote::error::AppError;
use holiday_quote::workflows::booking::wizard::WizardSnapshot;
use holiday_quote::workflows::booking::{
    ApartmentId, AvailabilityOutcome, BookingQuoteService, BookingServiceError, ChildGuest,
    FunnelObserver, GuestContact, LookupContext, QuoteParams, QuoteResult, QuoteWizard,
    WizardError, WizardTask,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Apartment to include in the stay; repeat for several apartments
    #[arg(long = "apartment", required = true)]
    pub(crate) apartments: Vec<String>,
    /// Check-in date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) checkin: NaiveDate,
    /// Check-out date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) checkout: NaiveDate,
    #[arg(long, default_value_t = 2)]
    pub(crate) adults: u32,
    /// Children under twelve, each in a bed of their own
    #[arg(long, default_value_t = 0)]
    pub(crate) children: u32,
    /// Travelling with a pet
    #[arg(long)]
    pub(crate) pet: bool,
    /// Request bed linen and towels for every guest
    #[arg(long)]
    pub(crate) linen: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Season year to walk through. Defaults to next year.
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Stop after the summary without saving a quote request.
    #[arg(long)]
    pub(crate) skip_submit: bool,
}

pub(crate) async fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        apartments,
        checkin,
        checkout,
        adults,
        children,
        pet,
        linen,
    } = args;

    let mut years = vec![checkin.year()];
    if checkout.year() != checkin.year() {
        years.push(checkout.year());
    }
    let backend = DemoBackend::seeded(checkin.year());
    let service = demo_service(&backend, EngineConfig::default(), &years).await;
    let ctx = service.context_for_today();

    let apartments: Vec<ApartmentId> = apartments.into_iter().map(ApartmentId::new).collect();
    println!("Quote for {checkin} -> {checkout}");

    match service.check_stay_dates(&ctx, checkin, checkout).await {
        Ok(nights) => println!("- Stay rules: ok ({nights} nights)"),
        Err(err) => println!("- Stay rules: {err}"),
    }

    let availability = service
        .check_many_availability(&ctx, &apartments, checkin, checkout)
        .await;
    render_availability(&availability);

    let params = QuoteParams {
        apartments,
        checkin: Some(checkin),
        checkout: Some(checkout),
        adults,
        children: (0..children)
            .map(|_| ChildGuest {
                under_twelve: true,
                ..ChildGuest::default()
            })
            .collect(),
        has_pet: pet,
        linen_requested: linen,
        ..QuoteParams::default()
    };
    let result = service.calculate_quote(&ctx, &params).await;
    render_quote(&result);

    Ok(())
}

/// Prints each wizard step as it is entered.
struct ConsoleFunnel;

impl FunnelObserver for ConsoleFunnel {
    fn step_entered(&self, snapshot: &WizardSnapshot) {
        println!(
            "\n[{}/7] {}",
            snapshot.step.number(),
            snapshot.step.label()
        );
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { year, skip_submit } = args;

    let year = year.unwrap_or_else(|| Local::now().date_naive().year() + 1);
    let out_of_range =
        || AppError::from(BookingServiceError::Validation(format!("year {year} out of range")));
    let reference_day = NaiveDate::from_ymd_opt(year, 3, 1).ok_or_else(out_of_range)?;
    let first_july_week =
        NaiveDate::from_weekday_of_month_opt(year, 7, Weekday::Sat, 1).ok_or_else(out_of_range)?;
    let checkin = first_july_week + chrono::Duration::weeks(1);
    let checkout = checkin + chrono::Duration::weeks(1);

    let backend = DemoBackend::seeded(year);
    let service = demo_service(&backend, EngineConfig::default(), &[year])
        .await
        .with_reference_day(reference_day);
    let ctx = service.context_for_today();

    println!("Holiday quote demo for the {year} season (today is {reference_day})");

    let report = service
        .check_availability_detailed(
            &ctx,
            &ApartmentId::new("girasole"),
            first_july_week,
            checkin,
        )
        .await;
    if let Some(window) = report.suggestion {
        println!(
            "Girasole is taken on {first_july_week}; nearest free week is {} -> {}",
            window.checkin, window.checkout
        );
    }

    let catalog = backend
        .stores()
        .apartments
        .list()
        .await
        .map_err(BookingServiceError::from)?
        .into_iter()
        .map(|apartment| apartment.id)
        .collect();
    let mut wizard = QuoteWizard::new(catalog, Arc::new(ConsoleFunnel));

    wizard.set_guests(
        3,
        vec![ChildGuest {
            under_twelve: true,
            ..ChildGuest::default()
        }],
    );
    println!("- 3 adults and a 7-year-old");
    if !advance(&mut wizard, &service, &ctx).await {
        return Ok(());
    }

    let calendar_check = wizard.set_dates(checkin, checkout);
    println!("- {checkin} -> {checkout}");
    run_task(&mut wizard, calendar_check, &service, &ctx).await;
    if !advance(&mut wizard, &service, &ctx).await {
        return Ok(());
    }
    render_availability(wizard.availability());

    wizard.set_apartments(vec![ApartmentId::new("corallo")]);
    println!("- choosing Corallo");
    if !advance(&mut wizard, &service, &ctx).await {
        return Ok(());
    }

    wizard.set_pet(true, None);
    println!("- bringing the dog");
    if !advance(&mut wizard, &service, &ctx).await {
        return Ok(());
    }

    wizard.set_linen(true);
    println!("- linen for everyone");
    if !advance(&mut wizard, &service, &ctx).await {
        return Ok(());
    }
    match wizard.quote() {
        Some(quote) => render_quote(quote),
        None => println!("  Quote unavailable"),
    }

    if skip_submit {
        return Ok(());
    }
    if !advance(&mut wizard, &service, &ctx).await {
        return Ok(());
    }

    let contact = GuestContact {
        name: "Chiara Russo".to_string(),
        email: Some("chiara.russo@example.org".to_string()),
        phone: None,
    };
    let id = match wizard.submit(&service, &ctx, &contact).await {
        Ok(id) => id,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    service.mark_quote_request_sent(&ctx, &id).await?;
    let stored = service.quote_request(&ctx, &id).await?;
    println!(
        "- Quote request {} saved for {} (total {}, sent: {})",
        stored.id, stored.guest_name, stored.final_total, stored.whatsapp_sent
    );
    println!(
        "  {} quote request(s) on file",
        backend.quote_requests.requests().len()
    );

    Ok(())
}

/// Moves the wizard forward and runs whatever lookup the new step needs.
async fn advance(
    wizard: &mut QuoteWizard,
    service: &BookingQuoteService,
    ctx: &LookupContext,
) -> bool {
    let task = match wizard.next() {
        Ok(task) => task,
        Err(err) => {
            report_wizard_error(&err);
            return false;
        }
    };

    if let Some(task) = task {
        run_task(wizard, task, service, ctx).await;
    }
    true
}

async fn run_task(
    wizard: &mut QuoteWizard,
    task: WizardTask,
    service: &BookingQuoteService,
    ctx: &LookupContext,
) {
    let outcome = task.run(service, ctx).await;
    if !wizard.apply(outcome) {
        println!("  Discarded a stale result");
    }
}

fn report_wizard_error(err: &WizardError) {
    match err {
        WizardError::AvailabilityConflict { apartments } => {
            let names: Vec<&str> = apartments.iter().map(|id| id.0.as_str()).collect();
            println!("  Not available: {}", names.join(", "));
        }
        other => println!("  Cannot continue: {other}"),
    }
}

fn render_availability(results: &BTreeMap<ApartmentId, AvailabilityOutcome>) {
    println!("Availability:");
    for (apartment, outcome) in results {
        match outcome {
            AvailabilityOutcome::Available => println!("  - {}: free", apartment.0),
            AvailabilityOutcome::Unavailable { conflicts } => {
                let ranges: Vec<String> = conflicts
                    .iter()
                    .map(|conflict| format!("{} -> {}", conflict.start_date, conflict.end_date))
                    .collect();
                println!("  - {}: booked ({})", apartment.0, ranges.join(", "));
            }
            AvailabilityOutcome::LookupFailed { reason } => {
                println!("  - {}: unknown ({reason})", apartment.0)
            }
        }
    }
}

fn render_quote(result: &QuoteResult) {
    if !result.is_priced() {
        println!("No quote: pick at least one apartment and a valid date range.");
        for warning in &result.warnings {
            println!("  ! {warning}");
        }
        return;
    }

    println!("Quote ({} nights)", result.nights);
    for line in &result.apartments {
        println!(
            "  - {}: {} week(s) at {} | {}/{} beds ({}, -{}%) -> {}",
            line.name,
            line.billing_weeks,
            line.base_price,
            line.occupied_beds,
            line.beds,
            line.occupancy_band,
            line.discount_percent,
            line.final_price
        );
    }
    println!("  Apartments      {}", result.apartments_subtotal);
    println!("  Linen           {}", result.linen_fee);
    println!("  Pets            {}", result.pet_fee);
    println!("  Tourist tax     {}", result.tourist_tax);
    println!("  Cleaning        {}", result.cleaning_fee);
    println!("  Before discount {}", result.total_before_discount);
    println!("  Discount        {}", result.discount_total);
    println!("  Total           {}", result.final_total);
    println!(
        "  Deposit {} now, balance {} on arrival",
        result.deposit, result.balance
    );
    for warning in &result.warnings {
        println!("  ! {warning}");
    }
}
