use super::{fetch_source, print_json};
use crate::core::models::{ContributionDay, Contributions};
use crate::core::settings::{Secrets, Settings};
use crate::providers::{http_client, GithubClient};
use crate::ui::calendar::{render_svg, render_terminal};
use crate::ui::Theme;
use anyhow::Result;
use chrono::Local;

pub struct Options {
    pub json: bool,
    pub svg: bool,
    pub light: bool,
}

pub async fn run(settings: &Settings, secrets: &Secrets, options: Options) -> Result<()> {
    let github = GithubClient::new(http_client()?, &settings.github, secrets);
    let data = fetch_source(&github).await?;
    let today = Local::now().date_naive();

    if options.json {
        return print_json(&data);
    }

    if options.svg {
        let theme = if options.light { Theme::Light } else { Theme::Dark };
        println!("{}", render_svg(&data, today, theme));
        return Ok(());
    }

    println!("{} (@{})", summary(&data), settings.github.username);
    print!("{}", render_terminal(&data, today));
    Ok(())
}

fn busiest_day(data: &Contributions) -> Option<&ContributionDay> {
    data.contributions
        .iter()
        .filter(|d| d.count > 0)
        .max_by(|a, b| a.count.cmp(&b.count).then(b.date.cmp(&a.date)))
}

fn summary(data: &Contributions) -> String {
    let active = data.contributions.iter().filter(|d| d.count > 0).count();
    match busiest_day(data) {
        Some(day) => format!(
            "{} active days, busiest {} with {}",
            active, day.date, day.count
        ),
        None => "No contributions".to_string(),
    }
}
