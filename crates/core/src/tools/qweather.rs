//! # QWeather Tools
//!
//! Location lookup (`geo/v2/city/lookup`) and 30-day forecast
//! (`v7/weather/30d`) used by the weather agent.

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{decode_args, parameters_for, Tool, ToolError};
use crate::json::text_or_number;

/// Placeholder for dates the forecast does not cover
pub const NO_WEATHER_INFO: &str = "无天气信息";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QWeatherConfig {
    /// API key; falls back to `QWEATHER_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_geo_base_url")]
    pub geo_base_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_geo_base_url() -> String {
    "https://geoapi.qweather.com".to_string()
}

fn default_api_base_url() -> String {
    "https://devapi.qweather.com".to_string()
}

impl Default for QWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geo_base_url: default_geo_base_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl QWeatherConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("QWEATHER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// One day of the upstream forecast
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub fx_date: String,
    pub text_day: String,
    #[serde(deserialize_with = "text_or_number")]
    pub temp_max: String,
    #[serde(deserialize_with = "text_or_number")]
    pub temp_min: String,
}

/// One requested travel date, with or without forecast data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub weather: String,
    pub high: String,
    pub low: String,
}

/// One entry per requested date, in request order
///
/// Dates outside the forecast window get [`NO_WEATHER_INFO`] in every field.
pub fn match_forecast(daily: &[DailyForecast], dates: &[String]) -> Vec<ForecastDay> {
    dates
        .iter()
        .map(|date| match daily.iter().find(|d| d.fx_date == *date) {
            Some(day) => ForecastDay {
                date: date.clone(),
                weather: day.text_day.clone(),
                high: day.temp_max.clone(),
                low: day.temp_min.clone(),
            },
            None => ForecastDay {
                date: date.clone(),
                weather: NO_WEATHER_INFO.to_string(),
                high: NO_WEATHER_INFO.to_string(),
                low: NO_WEATHER_INFO.to_string(),
            },
        })
        .collect()
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    location: Vec<LookupLocation>,
}

#[derive(Deserialize)]
struct LookupLocation {
    id: String,
}

#[derive(Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    daily: Vec<DailyForecast>,
}

/// HTTP client for the two QWeather endpoints
#[derive(Debug, Clone)]
pub struct QWeatherClient {
    client: Client,
    api_key: Option<String>,
    geo_base_url: String,
    api_base_url: String,
}

impl QWeatherClient {
    pub fn new(config: &QWeatherConfig) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ToolError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.resolved_api_key(),
            geo_base_url: config.geo_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn key(&self) -> Result<&str, ToolError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ToolError::Configuration("QWEATHER_API_KEY is not set".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ToolError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http(format!("status {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ToolError::UnexpectedResponse(e.to_string()))
    }

    /// Resolve a place name to the LocationId the forecast endpoint expects
    pub async fn lookup_location(&self, address: &str) -> Result<String, ToolError> {
        let url = format!(
            "{}/geo/v2/city/lookup?location={}&key={}",
            self.geo_base_url,
            urlencoding::encode(address),
            urlencoding::encode(self.key()?)
        );

        let body: LookupResponse = self.get_json(&url).await?;
        if let Some(code) = body.code.as_deref().filter(|c| *c != "200") {
            return Err(ToolError::UnexpectedResponse(format!("lookup returned code {code}")));
        }

        body.location
            .into_iter()
            .next()
            .map(|l| l.id)
            .ok_or_else(|| ToolError::NotFound(format!("no location matches '{address}'")))
    }

    /// Daily forecast for the next 30 days
    pub async fn daily_forecast(&self, location_id: &str) -> Result<Vec<DailyForecast>, ToolError> {
        let url = format!(
            "{}/v7/weather/30d?location={}&key={}",
            self.api_base_url,
            urlencoding::encode(location_id),
            urlencoding::encode(self.key()?)
        );

        let body: ForecastResponse = self.get_json(&url).await?;
        if let Some(code) = body.code.as_deref().filter(|c| *c != "200") {
            return Err(ToolError::UnexpectedResponse(format!("forecast returned code {code}")));
        }
        Ok(body.daily)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LocationArgs {
    /// 地点名称，如'九寨沟'
    pub address: String,
}

/// `get_location_id`
pub struct LocationLookupTool {
    client: Arc<QWeatherClient>,
}

impl LocationLookupTool {
    pub fn new(client: Arc<QWeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for LocationLookupTool {
    fn name(&self) -> &'static str {
        "get_location_id"
    }

    fn description(&self) -> &'static str {
        "将地点名称转换为查询天气所需的LocationId"
    }

    fn parameters(&self) -> Value {
        parameters_for::<LocationArgs>()
    }

    fn label(&self) -> &'static str {
        "获取LocationId"
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: LocationArgs = decode_args(args)?;
        let id = self.client.lookup_location(&args.address).await?;
        Ok(Value::String(id))
    }

    fn observation(&self, output: &Value) -> String {
        format!("当前目的地的LocationId是: {}", output.as_str().unwrap_or_default())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastArgs {
    /// LocationId
    pub location_id: String,
    /// 从输入的旅行日期中提取的日期列表, 格式为'YYYY-MM-DD'
    pub dates: Vec<String>,
}

/// `get_weather_by_location_id`
pub struct ForecastTool {
    client: Arc<QWeatherClient>,
}

impl ForecastTool {
    pub fn new(client: Arc<QWeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ForecastTool {
    fn name(&self) -> &'static str {
        "get_weather_by_location_id"
    }

    fn description(&self) -> &'static str {
        "根据LocationId查询指定地点的天气信息"
    }

    fn parameters(&self) -> Value {
        parameters_for::<ForecastArgs>()
    }

    fn label(&self) -> &'static str {
        "获取天气信息"
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ForecastArgs = decode_args(args)?;
        let daily = self.client.daily_forecast(&args.location_id).await?;
        let report = match_forecast(&daily, &args.dates);
        serde_json::to_value(report).map_err(|e| ToolError::UnexpectedResponse(e.to_string()))
    }

    fn observation(&self, output: &Value) -> String {
        format!("当前目的地旅行日期期间的天气信息是: {output}")
    }
}
