mod news;
mod weather;

pub use news::{Headline, NewsApiProvider, NewsProvider, SampleNewsProvider};
pub use weather::{OpenWeatherProvider, SampleWeatherProvider, WeatherProvider, WeatherReport};
