use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use serde_json::json;
use tokio::time::{sleep, Duration};

use oilrisk_client::api::{is_transient, ApiClient};
use oilrisk_client::cache::RiskCache;
use oilrisk_client::config::Config;
use oilrisk_client::fetch::RiskFetcher;
use oilrisk_client::logging::{log, obj, v_bool, v_num, v_str, Domain, Level};
use oilrisk_client::prefs::{Locale, PrefsStore, ThemeMode};
use oilrisk_client::range::{RangePreset, TimeRange};
use oilrisk_client::report::{stream_to_writer, ReportClient};
use oilrisk_client::retry::retry_async;
use oilrisk_client::types::{AlertQuery, BacktestModel, BacktestParams, RiskLevel, WeightConfig};

fn print_usage() {
    eprintln!("Usage: oilrisk <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  risk                                   Current risk snapshot");
    eprintln!("  timeseries [1y|2y|5y|all]              Historical series (default 2y)");
    eprintln!("  alerts [page] [size] [Low|Medium|High] Alert list");
    eprintln!("  alert <id>                             Alert detail");
    eprintln!("  explain <YYYY-MM-DD>                   Factor explanation for a date");
    eprintln!("  radar [YYYY-MM-DD]                     Category radar scores");
    eprintln!("  report <alertId>                       Stream the AI report");
    eprintln!("  backtest <start> <end> <model>         Run a backtest (XGBoost|ARIMA|LSTM)");
    eprintln!("  weights <sd> <macro> <fin> <geo> <sent> Update category weights");
    eprintln!("  watch                                  Refresh risk periodically");
    eprintln!("  theme [dark|light]                     Show, set or toggle the theme");
    eprintln!("  locale [zh-CN|en-US]                   Show, set or toggle the locale");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("missing argument <{}>", name))
}

fn parse_num<T: std::str::FromStr>(s: &str, name: &str) -> Result<T> {
    s.parse()
        .map_err(|_| anyhow!("invalid {}: {:?}", name, s))
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    if let Err(err) = run(&args).await {
        log(
            Level::Error,
            Domain::System,
            "command_failed",
            obj(&[("command", v_str(&args[1])), ("msg", v_str(&err.to_string()))]),
        );
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<()> {
    let cfg = Config::from_env();
    let api = ApiClient::new(&cfg)?;

    match args[1].as_str() {
        "risk" => print_json(&api.current_risk().await?),
        "timeseries" => {
            let range = match args.get(2) {
                Some(p) => TimeRange::preset(RangePreset::parse(p)?),
                None => TimeRange::default(),
            };
            print_json(&api.timeseries(&range).await?)
        }
        "alerts" => {
            let query = AlertQuery {
                page: args.get(2).map(|s| parse_num(s, "page")).transpose()?,
                size: args.get(3).map(|s| parse_num(s, "size")).transpose()?,
                level: args
                    .get(4)
                    .map(|s| RiskLevel::parse(s).ok_or_else(|| anyhow!("invalid level: {}", s)))
                    .transpose()?,
                sort: None,
            };
            print_json(&api.alerts(&query).await?)
        }
        "alert" => {
            let id = parse_num(arg(args, 2, "id")?, "alert id")?;
            print_json(&api.alert_detail(id).await?)
        }
        "explain" => print_json(&api.factor_explanation(arg(args, 2, "date")?).await?),
        "radar" => print_json(&api.radar_scores(args.get(2).map(|s| s.as_str())).await?),
        "report" => {
            let id = parse_num(arg(args, 2, "alertId")?, "alert id")?;
            stream_report(&cfg, id).await
        }
        "backtest" => {
            let model = arg(args, 4, "model")?;
            let params = BacktestParams {
                start_date: arg(args, 2, "start")?.to_string(),
                end_date: arg(args, 3, "end")?.to_string(),
                model: BacktestModel::parse(model)
                    .ok_or_else(|| anyhow!("unknown model: {}", model))?,
            };
            print_json(&api.run_backtest(&params).await?)
        }
        "weights" => {
            let w = |i: usize, name: &str| -> Result<f64> { parse_num(arg(args, i, name)?, name) };
            let weights = WeightConfig {
                supply_demand: w(2, "supplyDemand")?,
                macro_: w(3, "macro")?,
                financial: w(4, "financial")?,
                geopolitical: w(5, "geopolitical")?,
                sentiment: w(6, "sentiment")?,
            };
            print_json(&api.update_weights(&weights).await?)
        }
        "watch" => watch(&cfg, api).await,
        "theme" => {
            let store = PrefsStore::new(&cfg.prefs_path);
            let prefs = match args.get(2) {
                Some(t) => {
                    let theme = ThemeMode::parse(t)?;
                    store.update(|p| p.theme = theme)?
                }
                None => store.update(|p| p.theme = p.theme.toggled())?,
            };
            print_json(&prefs)
        }
        "locale" => {
            let store = PrefsStore::new(&cfg.prefs_path);
            let prefs = match args.get(2) {
                Some(l) => {
                    let locale = Locale::parse(l)?;
                    store.update(|p| p.locale = locale)?
                }
                None => store.update(|p| p.locale = p.locale.toggled())?,
            };
            print_json(&prefs)
        }
        other => {
            print_usage();
            bail!("unknown command: {}", other)
        }
    }
}

async fn stream_report(cfg: &Config, alert_id: u64) -> Result<()> {
    let client = ReportClient::new(cfg)?;
    stream_to_writer(&client, alert_id, std::io::stdout()).await
}

async fn watch(cfg: &Config, api: ApiClient) -> Result<()> {
    let cache = RiskCache::new();
    let fetcher = RiskFetcher::new(Arc::new(api), cache.clone());
    let retry_cfg = cfg.retry();
    let range = TimeRange::default();

    let mut rx = cache.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow().clone();
            if let Some(current) = &state.current {
                println!(
                    "{}",
                    json!({
                        "date": current.date,
                        "riskIndex": current.risk_index,
                        "riskLevel": current.risk_level.as_str(),
                        "stale": state.stale,
                        "error": state.error,
                    })
                );
            }
        }
    });

    log(
        Level::Info,
        Domain::System,
        "watch_start",
        obj(&[
            ("api_base", v_str(&cfg.api_base)),
            ("refresh_secs", v_num(cfg.refresh_secs as f64)),
        ]),
    );

    loop {
        let current = retry_async(&retry_cfg, "refresh_current", is_transient, || {
            fetcher.refresh_current()
        })
        .await;
        let series = fetcher.refresh_timeseries(&range).await;
        log(
            Level::Info,
            Domain::System,
            "refresh",
            obj(&[
                ("current_ok", v_bool(current.is_ok())),
                ("timeseries_ok", v_bool(series.is_ok())),
                ("stale", v_bool(cache.state().stale)),
            ]),
        );
        sleep(Duration::from_secs(cfg.refresh_secs)).await;
    }
}
