/// プレゼンテーション層モジュール
///
/// コマンドの結果と進捗イベントをユーザー向け・機械向けの表示に変換します。
/// プレゼンテーション層はドメイン層に依存しますが、その逆はありません。
///
/// # モジュール
/// - `input`: APIキーの入力
/// - `output`: コマンド結果とエラーの出力（人間向け・機械向け）
/// - `progress`: 進捗イベントの表示
pub mod input;
pub mod output;
pub mod progress;
