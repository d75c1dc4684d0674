/// ドメインサービス: 表示用フォーマット
///
/// リモートファイルの有効期限などの時刻を、ユーザー設定のタイムゾーンオフセットで文字列にする。
use chrono::{DateTime, FixedOffset, Utc};

/// UTC時刻をオフセット付きでフォーマット
///
/// # 戻り値
/// - offset 0: "2025-11-29 16:49:10 UTC"
/// - offset 32400: "2025-11-30 01:49:10 +09:00"
///
/// オフセットが範囲外の場合はUTCで表示します。
pub fn format_timestamp(datetime: DateTime<Utc>, offset_seconds: i32) -> String {
    if offset_seconds == 0 {
        return datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    }

    match FixedOffset::east_opt(offset_seconds) {
        Some(offset) => datetime
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S %:z")
            .to_string(),
        None => datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}

/// 秒数を "m:ss" 形式に
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// バイト数を "12.34 MB"（10^6 単位）形式に
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp_utc() {
        // 1764434950 = 2025-11-29 16:49:10 UTC
        let dt = Utc.timestamp_opt(1764434950, 0).unwrap();
        assert_eq!(format_timestamp(dt, 0), "2025-11-29 16:49:10 UTC");
    }

    #[test]
    fn test_format_timestamp_jst() {
        let dt = Utc.timestamp_opt(1764434950, 0).unwrap();
        assert_eq!(format_timestamp(dt, 32400), "2025-11-30 01:49:10 +09:00");
    }

    #[test]
    fn test_format_timestamp_negative_offset() {
        let dt = Utc.timestamp_opt(1764434950, 0).unwrap();
        assert_eq!(format_timestamp(dt, -28800), "2025-11-29 08:49:10 -08:00");
    }

    #[test]
    fn test_format_timestamp_invalid_offset_falls_back_to_utc() {
        let dt = Utc.timestamp_opt(1764434950, 0).unwrap();
        assert!(format_timestamp(dt, 200_000).ends_with("UTC"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(40.0), "0:40");
        assert_eq!(format_duration(125.7), "2:05");
        assert_eq!(format_duration(-3.0), "0:00");
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(10_485_760), "10.49 MB");
    }
}
